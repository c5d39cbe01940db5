use chrono::{DateTime, Utc};
use serde_json::json;

use super::record_value;
use crate::cassette::ports::CLOCK;
use crate::cassette::session::SharedRecorder;
use crate::ports::Clock;

/// Records every timestamp handed out.
pub struct RecordingClock {
    inner: Box<dyn Clock>,
    recorder: SharedRecorder,
}

impl RecordingClock {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn Clock>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        let now = self.inner.now();
        record_value(&self.recorder, CLOCK, "now", json!({}), &now);
        now
    }
}
