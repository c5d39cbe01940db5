//! Port implementations.
//!
//! `live` talks to the real services, `recording` wraps live adapters and
//! writes cassettes, `replaying` serves cassettes back.

pub mod live;
pub mod recording;
pub mod replaying;
#[cfg(test)]
pub(crate) mod scripted;
