use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use serde_json::json;

use fogrelay_api::now_ms;

use crate::error::{EngineError, RelayError};

/// Append-only NDJSON file of messages whose invocation failed.
///
/// Line shape: `{"ts_ms", "kind", "error", "raw"}`.
pub struct DeadLetterWriter {
    path: String,
    out: Mutex<BufWriter<File>>,
}

impl DeadLetterWriter {
    pub fn open(path: &str) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| EngineError::Io { path: path.to_string(), source })?;
        Ok(Self {
            path: path.to_string(),
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn write(&self, error: &RelayError, raw: &str) -> std::io::Result<()> {
        let line = json!({
            "ts_ms": now_ms(),
            "kind": error.kind().as_str(),
            "error": error.to_string(),
            "raw": raw,
        });
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        serde_json::to_writer(&mut *out, &line)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}
