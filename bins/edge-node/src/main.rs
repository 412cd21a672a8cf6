mod app;
mod config;
mod error;
mod model;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use config::{Cli, Effective};
use error::EdgeError;
use model::LinearModel;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<(), EdgeError> {
    let eff = Effective::new(cli)?;

    // Model is loaded once and shared read-only by all requests.
    let model = Arc::new(LinearModel::load(&eff.model)?);
    tracing::info!(model = %eff.model, features = ?model.features, "loaded model");

    let token = CancellationToken::new();
    let mut server = tokio::spawn({
        let token = token.clone();
        async move { app::run(&eff.listen, model, token).await }
    });

    tokio::select! {
        joined = &mut server => return joined?,
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("shutting down...");
            token.cancel();
        }
    }

    server.await?
}
