use serde_json::json;

use super::record_value;
use crate::cassette::ports::ID_GEN;
use crate::cassette::session::SharedRecorder;
use crate::ports::IdGenerator;

/// Records every run id handed out.
pub struct RecordingIdGenerator {
    inner: Box<dyn IdGenerator>,
    recorder: SharedRecorder,
}

impl RecordingIdGenerator {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn IdGenerator>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl IdGenerator for RecordingIdGenerator {
    fn run_id(&self) -> String {
        let id = self.inner.run_id();
        record_value(&self.recorder, ID_GEN, "run_id", json!({}), &id);
        id
    }
}
