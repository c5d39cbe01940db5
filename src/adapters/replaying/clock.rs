use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::replay_value;
use crate::cassette::ports::CLOCK;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::Clock;

/// Serves recorded timestamps.
pub struct ReplayingClock {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingClock {
    /// Replays from `replayer`.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl Clock for ReplayingClock {
    fn now(&self) -> DateTime<Utc> {
        replay_value(&self.replayer, CLOCK, "now")
    }
}
