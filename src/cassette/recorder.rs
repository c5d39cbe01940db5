//! Accumulates interactions and writes them out as a YAML cassette.

use std::fmt::Display;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};

use super::format::{Cassette, Interaction};

/// Encodes a port result as `{"ok": value}` or `{"err": "message"}`.
pub fn envelope<T: Serialize, E: Display>(result: &Result<T, E>) -> Value {
    match result {
        Ok(value) => json!({ "ok": serde_json::to_value(value).unwrap_or(Value::Null) }),
        Err(e) => json!({ "err": e.to_string() }),
    }
}

/// Records interactions for one cassette file.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    cassette: Cassette,
}

impl CassetteRecorder {
    /// A recorder that will write to `path`.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self { path: path.into(), cassette: Cassette::new(name) }
    }

    /// Appends one interaction; `seq` is assigned here.
    pub fn record(&mut self, port: &str, method: &str, input: Value, output: Value) {
        let seq = self.cassette.interactions.len() as u64;
        self.cassette.interactions.push(Interaction {
            seq,
            port: port.to_string(),
            method: method.to_string(),
            input,
            output,
        });
    }

    /// Number of interactions so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cassette.interactions.len()
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cassette.interactions.is_empty()
    }

    /// Writes the cassette and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn finish(mut self) -> Result<PathBuf, std::io::Error> {
        self.cassette.recorded_at = chrono::Utc::now();
        let yaml = serde_yaml::to_string(&self.cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        Ok(self.path)
    }
}
