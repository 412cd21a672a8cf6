use fogrelay_engine::LatencyRelay;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;

/// Load and validate the configuration, then build the relay once so
/// file-backed sinks (dead letter, metrics) are opened as `serve` would.
pub fn run(args: ServeArgs) -> Result<(), ServerError> {
    let config = ServerConfig::effective(&args)?;
    let relay = config.relay.clone();
    LatencyRelay::from_config(&relay)?;

    println!("config:            {}", args.config);
    println!("ingest.listen:     {}", config.ingest.listen);
    println!("relay.endpoint:    {}", relay.endpoint);
    println!("relay.timeout_ms:  {}", relay.timeout_ms);
    println!("relay.on_failure:  {:?}", relay.on_failure);
    println!("relay.retry:       {} attempt(s)", relay.retry.attempts());
    if !relay.required_features.is_empty() {
        println!("required_features: {}", relay.required_features.join(", "));
    }
    println!("ok");
    Ok(())
}
