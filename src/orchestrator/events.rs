//! Progress events and the channel that carries them to the caller.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::analysis::AnalysisReport;
use crate::model::RunReport;

/// Events buffered between producer and consumer.
const CHANNEL_CAPACITY: usize = 64;

/// One line of the NDJSON progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Human-readable progress line.
    Log {
        /// Message text.
        content: String,
    },
    /// Verbose diagnostic detail.
    Debug {
        /// Message text.
        content: String,
    },
    /// Paths found by the deep scan of a resurrect run.
    RepoFiles {
        /// Repository-relative paths.
        files: Vec<String>,
    },
    /// Paths found by the deep scan of an analysis.
    Files {
        /// Repository-relative paths.
        files: Vec<String>,
    },
    /// Terminal event of an analysis.
    Analysis {
        /// The report.
        data: AnalysisReport,
    },
    /// Terminal event of a resurrect run.
    Result {
        /// The report.
        data: RunReport,
    },
}

impl RunEvent {
    /// Returns `true` for the events that end a stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Analysis { .. } | Self::Result { .. })
    }
}

/// The consumer dropped its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event consumer went away; run cancelled")]
pub struct Cancelled;

/// Producer half of the event stream.
///
/// Every `log` line is also kept so the terminal report can carry the full
/// transcript. [`EventSink::finish`] consumes the sink, so a stream carries
/// at most one terminal event.
pub struct EventSink {
    tx: mpsc::Sender<RunEvent>,
    logs: Vec<String>,
}

/// A connected sink and receiver.
#[must_use]
pub fn channel() -> (EventSink, mpsc::Receiver<RunEvent>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (EventSink { tx, logs: Vec::new() }, rx)
}

impl EventSink {
    async fn send(&self, event: RunEvent) -> Result<(), Cancelled> {
        self.tx.send(event).await.map_err(|_| Cancelled)
    }

    /// Emits a progress line.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] when the consumer is gone.
    pub async fn log(&mut self, message: impl Into<String>) -> Result<(), Cancelled> {
        let content = message.into();
        tracing::info!(target: "revive::progress", "{content}");
        self.logs.push(content.clone());
        self.send(RunEvent::Log { content }).await
    }

    /// Emits a diagnostic line.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] when the consumer is gone.
    pub async fn debug(&mut self, message: impl Into<String>) -> Result<(), Cancelled> {
        let content = message.into();
        tracing::debug!(target: "revive::progress", chars = content.len(), "debug event");
        self.send(RunEvent::Debug { content }).await
    }

    /// Emits a non-terminal data event such as [`RunEvent::RepoFiles`].
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] when the consumer is gone.
    pub async fn emit(&mut self, event: RunEvent) -> Result<(), Cancelled> {
        debug_assert!(!event.is_terminal());
        self.send(event).await
    }

    /// Every progress line so far, newline-joined.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.logs.join("\n")
    }

    /// Sends the terminal event and closes the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] when the consumer is gone.
    pub async fn finish(self, event: RunEvent) -> Result<(), Cancelled> {
        self.send(event).await
    }
}
