//! A recording session: one cassette recorder per port, written together.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use super::ports;
use super::recorder::CassetteRecorder;

/// Shared handle to one port's recorder.
pub type SharedRecorder = Arc<Mutex<CassetteRecorder>>;

/// Recorders for every port, writing under one timestamped directory.
pub struct RecordingSession {
    recorders: Vec<(&'static str, SharedRecorder)>,
    output_dir: PathBuf,
}

impl RecordingSession {
    /// Starts a session under `<root>/<timestamp>/`.
    ///
    /// # Errors
    ///
    /// Returns an error if that directory already exists or cannot be created.
    pub fn new(root: &Path) -> Result<Self, String> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let output_dir = root.join(&timestamp);
        if output_dir.exists() {
            return Err(format!("Cassette directory already exists: {}", output_dir.display()));
        }
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| format!("Failed to create cassette directory: {e}"))?;

        let recorders = ports::ALL
            .iter()
            .map(|port| {
                let path = output_dir.join(format!("{port}.cassette.yaml"));
                let recorder = CassetteRecorder::new(path, format!("{timestamp}-{port}"));
                (*port, Arc::new(Mutex::new(recorder)))
            })
            .collect();
        Ok(Self { recorders, output_dir })
    }

    /// Directory the cassettes are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Recorder for `port`; a detached recorder for unknown names.
    #[must_use]
    pub fn recorder(&self, port: &str) -> SharedRecorder {
        self.recorders
            .iter()
            .find(|(name, _)| *name == port)
            .map_or_else(
                || {
                    let path = self.output_dir.join("unknown.yaml");
                    Arc::new(Mutex::new(CassetteRecorder::new(path, port)))
                },
                |(_, recorder)| Arc::clone(recorder),
            )
    }

    /// Writes every non-empty cassette and returns the directory.
    ///
    /// Recording adapters may still hold their handles; the recorded
    /// interactions are taken out from under them.
    ///
    /// # Errors
    ///
    /// Returns an error if a cassette cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        for (port, shared) in self.recorders {
            let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
            let placeholder = CassetteRecorder::new(PathBuf::new(), port);
            let recorder = std::mem::replace(&mut *guard, placeholder);
            if recorder.is_empty() {
                continue;
            }
            recorder.finish().map_err(|e| format!("Failed to write {port} cassette: {e}"))?;
        }
        Ok(self.output_dir)
    }
}

/// Appends an interaction through a shared recorder.
pub fn record(
    recorder: &SharedRecorder,
    port: &str,
    method: &str,
    input: serde_json::Value,
    output: serde_json::Value,
) {
    recorder
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(port, method, input, output);
}
