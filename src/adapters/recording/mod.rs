//! Adapters that delegate to a live implementation and record every call.

mod clock;
mod filesystem;
mod id_gen;
mod llm;
mod repository;
mod publisher;
mod sandbox;

pub use clock::RecordingClock;
pub use filesystem::RecordingFileSystem;
pub use id_gen::RecordingIdGenerator;
pub use llm::RecordingLlmClient;
pub use publisher::RecordingPublisher;
pub use repository::RecordingRepository;
pub use sandbox::RecordingSandbox;

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

use crate::cassette::recorder::envelope;
use crate::cassette::session::{record, SharedRecorder};

/// Records a plain (infallible) return value.
pub(crate) fn record_value<O: Serialize>(
    recorder: &SharedRecorder,
    port: &str,
    method: &str,
    input: Value,
    output: &O,
) {
    let output = serde_json::to_value(output).unwrap_or(Value::Null);
    record(recorder, port, method, input, output);
}

/// Records a `Result` as an `{"ok": ..}` / `{"err": ..}` envelope.
pub(crate) fn record_result<T: Serialize, E: Display>(
    recorder: &SharedRecorder,
    port: &str,
    method: &str,
    input: Value,
    result: &Result<T, E>,
) {
    record(recorder, port, method, input, envelope(result));
}
