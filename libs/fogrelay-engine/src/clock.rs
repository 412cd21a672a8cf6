use std::collections::VecDeque;
use std::sync::Mutex;

/// Wall-clock source, in Unix seconds.
///
/// Latencies are differences between readings of this clock, and the
/// end-to-end figure compares it with the producer's own clock, so it must
/// be wall time rather than a monotonic counter.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// The host's system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        fogrelay_api::now_secs()
    }
}

/// Replays a fixed sequence of instants, then keeps returning the last one.
///
/// Used to drive the relay through exact timelines in simulations and tests.
#[derive(Debug)]
pub struct ScriptedClock {
    ticks: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl ScriptedClock {
    pub fn new(ticks: impl IntoIterator<Item = f64>) -> Self {
        let ticks: VecDeque<f64> = ticks.into_iter().collect();
        let first = ticks.front().copied().unwrap_or(0.0);
        Self {
            ticks: Mutex::new(ticks),
            last: Mutex::new(first),
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> f64 {
        let mut ticks = self.ticks.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(t) = ticks.pop_front() {
            *last = t;
        }
        *last
    }
}
