//! Latency-measuring relay between a telemetry transport and a prediction service.

pub mod clock;
pub mod config;
pub mod dead_letter;
pub mod error;
pub mod observer;
pub mod prediction;
pub mod relay;
pub mod report;
pub mod retry;
pub mod service;

pub use clock::{Clock, ScriptedClock, SystemClock};
pub use config::{FailurePolicy, RelayConfig, RelaySettings};
pub use dead_letter::DeadLetterWriter;
pub use error::{EngineError, FailureKind, RelayError, ServiceError};
pub use observer::{NdjsonObserver, RelayObserver, TracingObserver};
pub use prediction::Prediction;
pub use relay::{LatencyRelay, Outcome, RawMessage};
pub use report::{LatencyReport, RelayEvent};
pub use retry::{Backoff, RetryPolicy};
pub use service::{HttpPredictionService, PredictionService};
