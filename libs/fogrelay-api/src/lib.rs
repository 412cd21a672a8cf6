//! Wire types shared by the relay, the edge node and the sensor simulator.

pub mod features;
pub mod prediction;
pub mod reading;
mod util;

pub use features::{GLUCOSE_FEATURES, TIMESTAMP_SENT};
pub use prediction::{ErrorResponse, PredictResponse};
pub use reading::{Reading, ReadingError, SendTimestamp};
pub use util::{now_ms, now_secs, round_to};
