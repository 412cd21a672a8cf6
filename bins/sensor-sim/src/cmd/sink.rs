use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use fogrelay_api::Reading;

use super::config::SinkConfig;
use super::error::SimError;

// ═══════════════════════════════════════════════════════════════
//  Sink (one configured destination with its connection state)
// ═══════════════════════════════════════════════════════════════

pub enum Sink {
    Tcp {
        name: String,
        addr: String,
        stream: Option<TcpStream>,
        buf: Vec<u8>,
    },
    Http {
        name: String,
        url: String,
        client: reqwest::Client,
    },
}

impl Sink {
    pub fn from_config(cfg: &SinkConfig) -> Result<Self, SimError> {
        Ok(match cfg {
            SinkConfig::Tcp { name, addr } => Sink::Tcp {
                name: name.clone(),
                addr: addr.clone(),
                stream: None,
                buf: Vec::with_capacity(1024),
            },
            SinkConfig::Http { name, url, timeout_ms } => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_millis(*timeout_ms))
                    .build()
                    .map_err(|e| SimError::Config(format!("[{name}] http client: {e}")))?;
                Sink::Http { name: name.clone(), url: url.clone(), client }
            }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Sink::Tcp { name, .. } | Sink::Http { name, .. } => name,
        }
    }

    async fn send(&mut self, reading: &Reading) -> Result<(), SimError> {
        match self {
            Sink::Tcp { name, addr, stream, buf } => {
                buf.clear();
                serde_json::to_writer(&mut *buf, reading)
                    .map_err(|e| SimError::Send { sink: name.clone(), detail: e.to_string() })?;
                buf.push(b'\n');

                if stream.is_none() {
                    let s = TcpStream::connect(addr.as_str())
                        .await
                        .map_err(|e| SimError::Send { sink: name.clone(), detail: format!("connect {addr}: {e}") })?;
                    tracing::info!(sink = %name, %addr, "connected");
                    *stream = Some(s);
                }
                if let Some(s) = stream.as_mut() {
                    s.write_all(&buf[..])
                        .await
                        .map_err(|e| SimError::Send { sink: name.clone(), detail: e.to_string() })?;
                }
                Ok(())
            }
            Sink::Http { name, url, client } => {
                let resp = client
                    .post(url.as_str())
                    .json(reading)
                    .send()
                    .await
                    .map_err(|e| SimError::Send { sink: name.clone(), detail: e.to_string() })?;
                let status = resp.status();
                let body = match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(sink = %name, %status, error = %e, "failed to read response body");
                        String::new()
                    }
                };
                if status.is_success() {
                    tracing::info!(sink = %name, %status, response = %body, "received");
                } else {
                    tracing::warn!(sink = %name, %status, response = %body, "prediction rejected");
                }
                Ok(())
            }
        }
    }

    /// Send once. A tcp sink that fails drops its connection and tries
    /// exactly one more time; an http POST is never repeated.
    pub async fn send_reconnect(&mut self, reading: &Reading) -> Result<(), SimError> {
        let err = match self.send(reading).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        match self {
            Sink::Tcp { name, stream, .. } => {
                tracing::warn!(sink = %name, error = %err, "send error, reconnecting");
                *stream = None;
                self.send(reading).await
            }
            Sink::Http { .. } => Err(err),
        }
    }
}

pub fn load_sinks(cfgs: &[SinkConfig]) -> Result<Vec<Sink>, SimError> {
    cfgs.iter().map(Sink::from_config).collect()
}
