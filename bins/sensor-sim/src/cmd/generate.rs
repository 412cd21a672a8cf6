use std::time::Duration;

use fogrelay_api::{Reading, now_secs};

use super::config::Effective;
use super::domain::{Dataset, Rng, generate_reading, stamp};
use super::error::SimError;
use super::sink::{Sink, load_sinks};

// ═══════════════════════════════════════════════════════════════
//  Main dispatch
// ═══════════════════════════════════════════════════════════════

pub async fn run(args: &Effective) -> Result<(), SimError> {
    let mut sinks = load_sinks(&args.sinks)?;

    println!("Sensor Simulator");
    println!("  sinks    : {}", sinks.iter().map(|s| s.name()).collect::<Vec<_>>().join(", "));
    println!("  interval : {} ms", args.interval_ms);
    if let Some(count) = args.count {
        println!("  count    : {count}");
    }

    let sent = match &args.file {
        Some(path) => {
            let mut dataset = Dataset::open(path)?;
            println!("  mode     : file ({}, {} rows, {} skipped)", dataset.path, dataset.total(), dataset.skipped);
            println!();
            pump(args, &mut sinks, || dataset.next_reading().cloned()).await
        }
        None => {
            let mut rng = Rng::new(args.seed);
            println!("  mode     : stream");
            println!();
            pump(args, &mut sinks, || Some(generate_reading(&mut rng, &args.device))).await
        }
    };

    println!("  done: {sent} readings sent");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
//  Send loop
// ═══════════════════════════════════════════════════════════════

/// Send one reading per interval until the source runs dry, `count` is
/// reached or Ctrl+C. Returns the number of readings sent.
async fn pump<F>(args: &Effective, sinks: &mut [Sink], mut next: F) -> u64
where
    F: FnMut() -> Option<Reading>,
{
    let mut interval = tokio::time::interval(Duration::from_millis(args.interval_ms));
    let mut sent = 0u64;

    println!("Sending... (Ctrl+C to stop)");

    loop {
        if args.count.is_some_and(|c| sent >= c) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n  stopped");
                break;
            }
            _ = interval.tick() => {
                let Some(reading) = next() else { break };
                let reading = stamp(&reading, now_secs());
                send_all(sinks, &reading).await;
                sent += 1;
            }
        }
    }

    sent
}

async fn send_all(sinks: &mut [Sink], reading: &Reading) {
    match serde_json::to_string(reading) {
        Ok(payload) => tracing::info!(payload = %payload, "sending reading"),
        Err(e) => tracing::warn!(error = %e, "cannot render reading for the log"),
    }
    for sink in sinks.iter_mut() {
        if let Err(e) = sink.send_reconnect(reading).await {
            tracing::error!(sink = %sink.name(), error = %e, "send error");
        }
    }
}
