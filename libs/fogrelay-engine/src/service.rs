use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use fogrelay_api::Reading;

use crate::error::{EngineError, ServiceError};

/// Synchronous inference endpoint consumed by the relay.
///
/// Returns the raw success body; decoding it is the relay's job so that a
/// bad body is reported separately from a failed call.
pub trait PredictionService: Send + Sync {
    fn predict<'a>(
        &'a self,
        reading: &'a Reading,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ServiceError>> + Send + 'a>>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

/// `POST <endpoint>` with the reading as JSON body.
pub struct HttpPredictionService {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpPredictionService {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Client(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }

    fn classify(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout)
        } else if e.is_connect() {
            ServiceError::Connect(e.to_string())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

impl PredictionService for HttpPredictionService {
    fn predict<'a>(
        &'a self,
        reading: &'a Reading,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ServiceError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(&self.endpoint)
                .json(reading)
                .send()
                .await
                .map_err(|e| self.classify(e))?;

            let status = resp.status();
            let body = resp.bytes().await.map_err(|e| self.classify(e))?;

            if status.is_success() {
                Ok(body.to_vec())
            } else {
                Err(ServiceError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                })
            }
        })
    }

    fn describe(&self) -> String {
        format!("POST {}", self.endpoint)
    }
}
