//! Scripted in-memory adapters for unit tests.

mod clock;
mod id_gen;
mod llm;
mod repository;
mod sandbox;

pub use clock::FixedClock;
pub use id_gen::SequentialIds;
pub use llm::ScriptedLlm;
pub use repository::ScriptedRepository;
pub use sandbox::{SandboxJournal, ScriptedSandbox};
