//! Adapters that serve recorded cassettes instead of calling out.
//!
//! Fallible methods surface cassette exhaustion as an error. Infallible ones
//! (`Clock::now`, `IdGenerator::run_id`, `SandboxProvider::is_available`,
//! `SandboxSession::host`) panic, since a replay that diverges from its
//! recording cannot continue meaningfully.

mod clock;
mod filesystem;
mod id_gen;
mod llm;
mod publisher;
mod repository;
mod sandbox;

pub use clock::ReplayingClock;
pub use filesystem::ReplayingFileSystem;
pub use id_gen::ReplayingIdGenerator;
pub use llm::ReplayingLlmClient;
pub use publisher::ReplayingPublisher;
pub use repository::ReplayingRepository;
pub use sandbox::ReplayingSandbox;

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;

use crate::cassette::replayer::CassetteReplayer;
use crate::ports::PortError;

fn lock(replayer: &Mutex<CassetteReplayer>) -> MutexGuard<'_, CassetteReplayer> {
    replayer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Next plain output.
///
/// # Panics
///
/// Panics when the cassette has no matching interaction left.
pub(crate) fn replay_value<T: DeserializeOwned>(
    replayer: &Mutex<CassetteReplayer>,
    port: &str,
    method: &str,
) -> T {
    lock(replayer).next_output(port, method).unwrap_or_else(|e| panic!("{e}"))
}

/// Next `{"ok": ..}` / `{"err": "message"}` envelope as a port result.
pub(crate) fn replay_result<T: DeserializeOwned>(
    replayer: &Mutex<CassetteReplayer>,
    port: &str,
    method: &str,
) -> Result<T, PortError> {
    match lock(replayer).next_result::<T, String>(port, method) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => Err(message.into()),
        Err(replay) => Err(replay.into()),
    }
}
