use std::path::Path;
use std::sync::Mutex;

use super::replay_result;
use crate::cassette::ports::FS;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{FileSystem, PortError};

/// Serves recorded memory-log reads; writes are checked against the recording.
pub struct ReplayingFileSystem {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingFileSystem {
    /// Replays from `replayer`.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl FileSystem for ReplayingFileSystem {
    fn read_optional(&self, _path: &Path) -> Result<Option<String>, PortError> {
        replay_result(&self.replayer, FS, "read_optional")
    }

    fn write(&self, _path: &Path, _contents: &str) -> Result<(), PortError> {
        replay_result(&self.replayer, FS, "write")
    }
}
