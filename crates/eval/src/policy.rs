//! Session policy collaborator.
//!
//! The `SessionPolicy` trait is the seam through which an orchestrator tells
//! an item session how to enforce timing. `StaticSessionPolicy` is the
//! reference implementation, loadable from configuration with serde.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// Decisions an item session delegates to its owner.
pub trait SessionPolicy: Debug + Send + Sync {
    /// Whether minimum-time constraints must be enforced when an attempt
    /// ends.
    fn must_consider_min_time(&self) -> bool;
}

/// Fixed policy answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StaticSessionPolicy {
    pub consider_min_time: bool,
}

impl Default for StaticSessionPolicy {
    fn default() -> Self {
        StaticSessionPolicy {
            consider_min_time: true,
        }
    }
}

impl StaticSessionPolicy {
    /// Never enforce minimum times.
    pub fn lenient() -> Self {
        StaticSessionPolicy {
            consider_min_time: false,
        }
    }
}

impl SessionPolicy for StaticSessionPolicy {
    fn must_consider_min_time(&self) -> bool {
        self.consider_min_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enforces_min_time() {
        assert!(StaticSessionPolicy::default().must_consider_min_time());
        assert!(!StaticSessionPolicy::lenient().must_consider_min_time());
    }

    #[test]
    fn loads_from_json() {
        let policy: StaticSessionPolicy =
            serde_json::from_str(r#"{ "considerMinTime": false }"#).unwrap();
        assert!(!policy.must_consider_min_time());
        let policy: StaticSessionPolicy = serde_json::from_str("{}").unwrap();
        assert!(policy.must_consider_min_time());
    }
}
