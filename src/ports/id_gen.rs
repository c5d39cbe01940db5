//! Run identifiers.

/// Hands out an identifier for each orchestration run.
pub trait IdGenerator: Send + Sync {
    /// A fresh run identifier, unique per process lifetime at minimum.
    fn run_id(&self) -> String;
}
