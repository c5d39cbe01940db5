use std::path::Path;

use serde_json::json;

use super::record_result;
use crate::cassette::ports::FS;
use crate::cassette::session::SharedRecorder;
use crate::ports::{FileSystem, PortError};

/// Records memory-log reads and writes.
pub struct RecordingFileSystem {
    inner: Box<dyn FileSystem>,
    recorder: SharedRecorder,
}

impl RecordingFileSystem {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn FileSystem>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl FileSystem for RecordingFileSystem {
    fn read_optional(&self, path: &Path) -> Result<Option<String>, PortError> {
        let result = self.inner.read_optional(path);
        record_result(&self.recorder, FS, "read_optional", json!({ "path": path }), &result);
        result
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        let result = self.inner.write(path, contents);
        let input = json!({ "path": path, "chars": contents.chars().count() });
        record_result(&self.recorder, FS, "write", input, &result);
        result
    }
}
