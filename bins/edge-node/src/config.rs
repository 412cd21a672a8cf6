use clap::Parser;
use serde::Deserialize;

use crate::error::EdgeError;

#[derive(Parser, Clone, Debug)]
#[command(name = "edge-node", about = "Glucose prediction service")]
pub struct Cli {
    /// Optional TOML configuration file
    #[arg(long, env = "EDGE_NODE_CONFIG")]
    pub config: Option<String>,

    /// Address to listen on (default 127.0.0.1:5000)
    #[arg(long, env = "EDGE_NODE_LISTEN")]
    pub listen: Option<String>,

    /// Path to the linear model JSON
    #[arg(long, env = "EDGE_NODE_MODEL")]
    pub model: Option<String>,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub listen: Option<String>,
    pub model: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, EdgeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EdgeError::Config(format!("cannot read config {path}: {e}")))?;
        toml::from_str(&content).map_err(|e| EdgeError::Config(format!("bad config {path}: {e}")))
    }
}

// ---- Effective ----

/// Final settings: config file < env/CLI.
#[derive(Debug)]
pub struct Effective {
    pub listen: String,
    pub model: String,
}

impl Effective {
    pub fn new(cli: &Cli) -> Result<Self, EdgeError> {
        let cfg = match &cli.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        Self::merge(cli, cfg)
    }

    fn merge(cli: &Cli, cfg: Config) -> Result<Self, EdgeError> {
        let model = cli
            .model
            .clone()
            .or(cfg.model)
            .ok_or_else(|| EdgeError::Config("no model given (--model or `model` in config)".into()))?;
        Ok(Self {
            listen: cli.listen.clone().or(cfg.listen).unwrap_or_else(|| "127.0.0.1:5000".into()),
            model,
        })
    }
}
