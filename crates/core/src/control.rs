//! Session policy configuration: item session control, time limits and
//! navigation/submission modes.
//!
//! These are read-only to the runtime. All of them deserialize with serde
//! and fall back to their defaults for omitted fields, so an orchestrator
//! can load them from JSON or any other serde format.

use serde::{Deserialize, Serialize};
use time::Duration;

/// Per-item attempt and interaction policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemSessionControl {
    /// Maximum number of attempts; 0 means unlimited.
    pub max_attempts: u32,
    pub show_feedback: bool,
    pub allow_review: bool,
    pub show_solution: bool,
    pub allow_comment: bool,
    pub allow_skipping: bool,
    pub validate_responses: bool,
}

impl Default for ItemSessionControl {
    fn default() -> Self {
        ItemSessionControl {
            max_attempts: 1,
            show_feedback: false,
            allow_review: true,
            show_solution: false,
            allow_comment: false,
            allow_skipping: true,
            validate_responses: false,
        }
    }
}

impl ItemSessionControl {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_allow_skipping(mut self, allow_skipping: bool) -> Self {
        self.allow_skipping = allow_skipping;
        self
    }
}

/// Minimum and maximum time to spend on an item.
///
/// Durations are serialized as whole seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeLimits {
    #[serde(with = "optional_seconds")]
    pub min_time: Option<Duration>,
    #[serde(with = "optional_seconds")]
    pub max_time: Option<Duration>,
    pub allow_late_submission: bool,
}

impl TimeLimits {
    pub fn new(min_time: Option<Duration>, max_time: Option<Duration>) -> Self {
        TimeLimits {
            min_time,
            max_time,
            allow_late_submission: false,
        }
    }

    pub fn with_late_submission(mut self, allow: bool) -> Self {
        self.allow_late_submission = allow;
        self
    }

    pub fn has_min_time(&self) -> bool {
        self.min_time.is_some()
    }

    pub fn has_max_time(&self) -> bool {
        self.max_time.is_some()
    }
}

mod optional_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.whole_seconds()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(d)?.map(Duration::seconds))
    }
}

/// How the candidate moves between items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationMode {
    #[default]
    Linear,
    NonLinear,
}

/// When responses are submitted for processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionMode {
    /// Responses are processed at the end of each attempt.
    #[default]
    Individual,
    /// Processing is deferred to the end of a group of items; one attempt only.
    Simultaneous,
}
