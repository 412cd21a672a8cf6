use clap::Args;
use serde::Deserialize;

use super::domain::DeviceProfile;
use super::error::SimError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub interval_ms: Option<u64>,
    pub count: Option<u64>,
    pub seed: Option<i64>,
    pub file: Option<String>,
    #[serde(default)]
    pub device: DeviceProfile,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum SinkConfig {
    /// Newline-delimited JSON to the relay ingest.
    Tcp {
        #[serde(default = "default_sink_name")]
        name: String,
        addr: String,
    },
    /// POST straight to the prediction endpoint.
    Http {
        #[serde(default = "default_sink_name")]
        name: String,
        url: String,
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
    },
}

impl SinkConfig {
    pub fn name(&self) -> &str {
        match self {
            SinkConfig::Tcp { name, .. } | SinkConfig::Http { name, .. } => name,
        }
    }
}

fn default_sink_name() -> String {
    "unnamed".into()
}
fn default_http_timeout_ms() -> u64 {
    5000
}

pub fn load_config(path: &str) -> Result<Config, SimError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| SimError::Config(format!("cannot read config {path}: {e}")))?;
    parse_config(&content).map_err(|e| SimError::Config(format!("bad config {path}: {e}")))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct GenArgs {
    /// Path to the TOML config
    #[arg(long, default_value = "sensor-sim.toml", env = "SENSOR_SIM_CONFIG")]
    pub config: String,

    /// Milliseconds between readings (default 5000)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many readings (default: run until Ctrl+C / end of file)
    #[arg(long)]
    pub count: Option<u64>,

    /// PRNG seed (0 = current time)
    #[arg(long)]
    pub seed: Option<i64>,

    /// Replay rows of a CSV dataset instead of generating readings
    #[arg(long)]
    pub file: Option<String>,

    /// Extra tcp sink: relay ingest address, e.g. 127.0.0.1:9300
    #[arg(long, env = "SENSOR_SIM_TCP")]
    pub tcp: Option<String>,

    /// Extra http sink: prediction endpoint, e.g. http://127.0.0.1:5000/predict
    #[arg(long, env = "SENSOR_SIM_HTTP")]
    pub http: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective (merged config)
// ═══════════════════════════════════════════════════════════════

/// Final settings after the merge: config file < env/CLI.
#[derive(Debug)]
pub struct Effective {
    pub interval_ms: u64,
    pub count: Option<u64>,
    pub seed: i64,
    pub file: Option<String>,
    pub device: DeviceProfile,
    pub sinks: Vec<SinkConfig>,
}

impl Effective {
    pub fn new(args: &GenArgs) -> Result<Self, SimError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &GenArgs, cfg: Config) -> Result<Self, SimError> {
        let mut sinks = cfg.sinks;
        if let Some(addr) = &args.tcp {
            sinks.push(SinkConfig::Tcp { name: "cli-tcp".into(), addr: addr.clone() });
        }
        if let Some(url) = &args.http {
            sinks.push(SinkConfig::Http {
                name: "cli-http".into(),
                url: url.clone(),
                timeout_ms: default_http_timeout_ms(),
            });
        }
        if sinks.is_empty() {
            return Err(SimError::Config("no sinks configured ([[sinks]], --tcp or --http)".into()));
        }

        let interval_ms = args.interval_ms.or(cfg.interval_ms).unwrap_or(5000);
        if interval_ms == 0 {
            return Err(SimError::Config("interval_ms must be > 0".into()));
        }

        Ok(Self {
            interval_ms,
            count: args.count.or(cfg.count),
            seed: args.seed.or(cfg.seed).unwrap_or(0),
            file: args.file.clone().or(cfg.file),
            device: cfg.device,
            sinks,
        })
    }
}
