//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the application core and an
//! external system (time, IDs, filesystem, LLM, repository host, pull-request
//! publisher, remote sandbox). Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod id_gen;
pub mod llm;
pub mod publisher;
pub mod repository;
pub mod sandbox;

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use id_gen::IdGenerator;
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmFuture};
pub use publisher::{PublishOutcome, PublishStatus, PullRequestPublisher};
pub use repository::{RepoRef, RepoTree, RepositoryReader, TreeEntry, TreeEntryKind};
pub use sandbox::{CommandOutput, CommandSpec, SandboxProvider, SandboxSession};

/// Error type shared by the fallible ports.
pub type PortError = Box<dyn Error + Send + Sync>;

/// Boxed future returned by async port methods, keeping the traits dyn-compatible.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PortError>> + Send + 'a>>;
