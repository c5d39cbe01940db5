//! Serves recorded interactions back, in order, per port and method.

use std::collections::{HashMap, VecDeque};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::format::{Cassette, Interaction};

/// Failure to serve a recorded interaction.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Nothing (more) was recorded for the call.
    #[error(
        "cassette exhausted: no interaction left for {port}::{method} (recorded: [{available}])"
    )]
    Exhausted {
        /// Requested port.
        port: String,
        /// Requested method.
        method: String,
        /// `port::method` pairs that still have interactions.
        available: String,
    },
    /// The recorded output has the wrong shape.
    #[error("malformed output for {port}::{method}: {message}")]
    Malformed {
        /// Requested port.
        port: String,
        /// Requested method.
        method: String,
        /// Decoder message.
        message: String,
    },
}

/// Replays one cassette.
pub struct CassetteReplayer {
    queues: HashMap<(String, String), VecDeque<Interaction>>,
}

impl CassetteReplayer {
    /// Indexes a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut queues: HashMap<(String, String), VecDeque<Interaction>> = HashMap::new();
        for interaction in &cassette.interactions {
            queues
                .entry((interaction.port.clone(), interaction.method.clone()))
                .or_default()
                .push_back(interaction.clone());
        }
        Self { queues }
    }

    /// Takes the next interaction recorded for `port::method`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Exhausted`] when none is left.
    pub fn next_interaction(
        &mut self,
        port: &str,
        method: &str,
    ) -> Result<Interaction, ReplayError> {
        let key = (port.to_string(), method.to_string());
        let next = self.queues.get_mut(&key).and_then(VecDeque::pop_front);
        next.ok_or_else(|| {
            let mut available: Vec<String> = self
                .queues
                .iter()
                .filter(|(_, queue)| !queue.is_empty())
                .map(|((p, m), _)| format!("{p}::{m}"))
                .collect();
            available.sort();
            ReplayError::Exhausted {
                port: port.to_string(),
                method: method.to_string(),
                available: available.join(", "),
            }
        })
    }

    /// Takes the next output and decodes it as `T`.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is left or the output does not decode.
    pub fn next_output<T: DeserializeOwned>(
        &mut self,
        port: &str,
        method: &str,
    ) -> Result<T, ReplayError> {
        let interaction = self.next_interaction(port, method)?;
        decode(port, method, interaction.output)
    }

    /// Takes the next `{"ok": ..}` / `{"err": ..}` envelope.
    ///
    /// The outer error is a replay failure; the inner one is the recorded error.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is left or the envelope does not decode.
    pub fn next_result<T: DeserializeOwned, E: DeserializeOwned>(
        &mut self,
        port: &str,
        method: &str,
    ) -> Result<Result<T, E>, ReplayError> {
        let mut output = self.next_interaction(port, method)?.output;
        if let Some(err) = output.get_mut("err").map(Value::take) {
            return decode(port, method, err).map(Err);
        }
        match output.get_mut("ok").map(Value::take) {
            Some(ok) => decode(port, method, ok).map(Ok),
            None => Err(ReplayError::Malformed {
                port: port.to_string(),
                method: method.to_string(),
                message: "expected an `ok` or `err` key".to_string(),
            }),
        }
    }
}

fn decode<T: DeserializeOwned>(port: &str, method: &str, value: Value) -> Result<T, ReplayError> {
    serde_json::from_value(value).map_err(|e| ReplayError::Malformed {
        port: port.to_string(),
        method: method.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queues_are_independent_per_method() {
        let cassette = Cassette::new("t")
            .with("repo", "tree", json!({"ok": 1}))
            .with("repo", "default_branch", json!({"ok": "main"}))
            .with("repo", "tree", json!({"ok": 2}));
        let mut replayer = CassetteReplayer::new(&cassette);

        let branch: Result<String, String> =
            replayer.next_result("repo", "default_branch").unwrap();
        assert_eq!(branch.unwrap(), "main");
        let first: Result<u32, String> = replayer.next_result("repo", "tree").unwrap();
        let second: Result<u32, String> = replayer.next_result("repo", "tree").unwrap();
        assert_eq!((first.unwrap(), second.unwrap()), (1, 2));
    }

    #[test]
    fn recorded_errors_come_back_as_inner_err() {
        let cassette = Cassette::new("t").with("repo", "tree", json!({"err": "404 Not Found"}));
        let mut replayer = CassetteReplayer::new(&cassette);
        let result: Result<u32, String> = replayer.next_result("repo", "tree").unwrap();
        assert_eq!(result.unwrap_err(), "404 Not Found");
    }

    #[test]
    fn exhaustion_names_what_is_left() {
        let cassette = Cassette::new("t").with("clock", "now", json!("2026-01-01T00:00:00Z"));
        let mut replayer = CassetteReplayer::new(&cassette);
        let err = replayer.next_output::<String>("llm", "complete").unwrap_err();
        assert!(err.to_string().contains("llm::complete"));
        assert!(err.to_string().contains("clock::now"));
    }

    #[test]
    fn envelope_without_ok_or_err_is_malformed() {
        let cassette = Cassette::new("t").with("fs", "write", json!({"value": 1}));
        let mut replayer = CassetteReplayer::new(&cassette);
        let err = replayer.next_result::<u32, String>("fs", "write").unwrap_err();
        assert!(matches!(err, ReplayError::Malformed { .. }));
    }
}
