use std::sync::atomic::{AtomicU32, Ordering};

use crate::ports::IdGenerator;

/// Hands out `run-1`, `run-2`, ...
#[derive(Default)]
pub struct SequentialIds(AtomicU32);

impl IdGenerator for SequentialIds {
    fn run_id(&self) -> String {
        format!("run-{}", self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
