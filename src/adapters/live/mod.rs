//! Adapters backed by the system and by HTTP services.

mod clock;
mod filesystem;
mod gemini;
mod github;
mod id_gen;
mod sandbox;

pub use clock::LiveClock;
pub use filesystem::LiveFileSystem;
pub use gemini::GeminiClient;
pub use github::{GitHubClient, WORK_BRANCH};
pub use id_gen::LiveIdGenerator;
pub use sandbox::{RemoteSandbox, ENVD_PORT};
