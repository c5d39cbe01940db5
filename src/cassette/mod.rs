//! Cassettes: YAML recordings of port interactions, replayed in tests and
//! for offline reproduction of a run.
//!
//! Fallible port calls are stored as `{"ok": value}` or `{"err": error}`.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;
pub mod session;

/// Port names used as cassette file stems and interaction tags.
pub mod ports {
    /// Clock port.
    pub const CLOCK: &str = "clock";
    /// Local filesystem port.
    pub const FS: &str = "fs";
    /// Run id port.
    pub const ID_GEN: &str = "id_gen";
    /// Generation backend port.
    pub const LLM: &str = "llm";
    /// Repository reader port.
    pub const REPO: &str = "repo";
    /// Pull-request publisher port.
    pub const PUBLISHER: &str = "publisher";
    /// Sandbox port.
    pub const SANDBOX: &str = "sandbox";

    /// Every port, in cassette directory order.
    pub const ALL: [&str; 7] = [CLOCK, FS, ID_GEN, LLM, REPO, PUBLISHER, SANDBOX];
}
