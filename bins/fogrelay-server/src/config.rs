use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use fogrelay_engine::RelayConfig;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "fogrelay-server", about = "Telemetry relay with latency accounting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Accept sensor messages and relay them to the prediction service
    Serve(ServeArgs),
    /// Validate the configuration file and exit
    Check(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml", env = "FOGRELAY_CONFIG")]
    pub config: String,

    /// Override `ingest.listen`
    #[arg(long, env = "FOGRELAY_LISTEN")]
    pub listen: Option<String>,

    /// Override `relay.endpoint`
    #[arg(long, env = "FOGRELAY_ENDPOINT")]
    pub endpoint: Option<String>,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    pub relay: RelayConfig,
}

/// Newline-delimited TCP ingest.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Longest accepted frame in bytes (0 = unlimited).
    #[serde(default)]
    pub max_frame_bytes: usize,
    /// Seconds to wait for in-flight invocations on shutdown.
    #[serde(default = "default_drain_secs")]
    pub drain_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_frame_bytes: 0,
            drain_secs: default_drain_secs(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:9300".into()
}
fn default_drain_secs() -> u64 {
    5
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Config file values with CLI/env overrides applied, validated.
    pub fn effective(args: &ServeArgs) -> Result<Self, ServerError> {
        let mut cfg = Self::load(&args.config)?;
        if let Some(listen) = &args.listen {
            cfg.ingest.listen = listen.clone();
        }
        if let Some(endpoint) = &args.endpoint {
            cfg.relay.endpoint = endpoint.clone();
        }
        cfg.relay.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_section_is_optional() {
        let cfg = ServerConfig::parse(
            r#"
            [relay]
            endpoint = "http://127.0.0.1:5000/predict"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.ingest.listen, "0.0.0.0:9300");
        assert_eq!(cfg.ingest.max_frame_bytes, 0);
        assert_eq!(cfg.relay.timeout_ms, 5000);
    }

    #[test]
    fn relay_section_is_required() {
        assert!(ServerConfig::parse("[ingest]\nlisten = \"127.0.0.1:1\"").is_err());
    }

    #[test]
    fn overrides_win_over_file() {
        let path = std::env::temp_dir().join(format!("fogrelay-server-cfg-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[ingest]\nlisten = \"127.0.0.1:9300\"\n[relay]\nendpoint = \"http://a/predict\"\n",
        )
        .unwrap();

        let args = ServeArgs {
            config: path.to_string_lossy().into_owned(),
            listen: Some("127.0.0.1:9999".into()),
            endpoint: Some("http://b/predict".into()),
        };
        let cfg = ServerConfig::effective(&args).unwrap();
        assert_eq!(cfg.ingest.listen, "127.0.0.1:9999");
        assert_eq!(cfg.relay.endpoint, "http://b/predict");

        let bad = ServeArgs { endpoint: Some("not a url".into()), ..args };
        assert!(matches!(ServerConfig::effective(&bad), Err(ServerError::Engine(_))));

        let _ = std::fs::remove_file(&path);
    }
}
