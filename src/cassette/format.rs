//! On-disk cassette layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One call made through a port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Position in the recording, assigned by the recorder.
    pub seq: u64,
    /// Port name, see [`super::ports`].
    pub port: String,
    /// Method invoked on the port.
    pub method: String,
    /// Arguments, for humans reading the cassette; replay ignores them.
    pub input: serde_json::Value,
    /// Returned value.
    pub output: serde_json::Value,
}

/// A recorded sequence of interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Name, usually `<timestamp>-<port>`.
    pub name: String,
    /// Time the recording was written.
    pub recorded_at: DateTime<Utc>,
    /// Version of the tool that wrote it.
    #[serde(default)]
    pub version: String,
    /// Interactions in call order.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// An empty cassette stamped with the crate version.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recorded_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            interactions: Vec::new(),
        }
    }

    /// Appends an interaction, numbering it after the last one.
    #[must_use]
    pub fn with(mut self, port: &str, method: &str, output: serde_json::Value) -> Self {
        let seq = self.interactions.len() as u64;
        self.interactions.push(Interaction {
            seq,
            port: port.to_string(),
            method: method.to_string(),
            input: serde_json::Value::Null,
            output,
        });
        self
    }
}
