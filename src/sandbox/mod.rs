//! Running a generated file set inside a remote sandbox.
//!
//! [`SessionSlot`] owns the one live session of a run; [`deploy`] writes the
//! files, installs dependencies, starts the backend (and frontend, when one
//! exists) and returns the log text that the classifier inspects.

mod deploy;
mod session;

use std::time::Duration;

pub use deploy::{deploy, DeployRequest};
pub use session::SessionSlot;

/// Deploy text produced when no sandbox credentials are configured.
pub const SANDBOX_UNAVAILABLE: &str = "Sandbox unavailable: no sandbox API key configured";

/// Lifetime requested for every session; the remote side reaps it afterwards.
pub const SESSION_LIFETIME: Duration = Duration::from_secs(1800);
