use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use fogrelay_engine::LatencyRelay;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;
use crate::ingest;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("fogrelay-server starting");

    // --- Load config ---
    let config = ServerConfig::effective(&args)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Relay ---
    let relay = Arc::new(LatencyRelay::from_config(&config.relay)?);

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Ingest listener ---
    let listener = TcpListener::bind(&config.ingest.listen)
        .await
        .map_err(|source| ServerError::Bind { addr: config.ingest.listen.clone(), source })?;
    tracing::info!(
        listen = %config.ingest.listen,
        max_frame_bytes = config.ingest.max_frame_bytes,
        "ingest listening"
    );

    let mut ingest_handle = tokio::spawn(ingest::run(
        listener,
        relay,
        config.ingest.max_frame_bytes,
        token.clone(),
    ));

    tracing::info!("server ready");

    // --- Wait for Ctrl+C ---
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");

    // Signal all tasks to stop cooperatively
    token.cancel();

    // Drain: give in-flight invocations a bounded amount of time
    let drain = Duration::from_secs(config.ingest.drain_secs);
    if tokio::time::timeout(drain, &mut ingest_handle).await.is_err() {
        tracing::warn!(drain_secs = config.ingest.drain_secs, "drain timed out, aborting ingest");
        ingest_handle.abort();
        let _ = ingest_handle.await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}
