use uuid::Uuid;

use crate::ports::IdGenerator;

/// Random run ids of the form `run-<12 hex digits>`.
pub struct LiveIdGenerator;

impl IdGenerator for LiveIdGenerator {
    fn run_id(&self) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("run-{}", &hex[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_short_and_distinct() {
        let a = LiveIdGenerator.run_id();
        let b = LiveIdGenerator.run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.starts_with("run-"));
    }
}
