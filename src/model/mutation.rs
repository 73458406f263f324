use serde::{Deserialize, Serialize};

use crate::model::ResourceError;

/// One retry cycle of a coordinated mutation. Lives only as long as the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationAttempt {
    pub attempt_number: usize,
    pub max_attempts: usize,
    pub last_error: Option<ResourceError>,
    pub is_retryable: bool,
}

impl MutationAttempt {
    pub fn is_final(&self) -> bool {
        !self.is_retryable || self.attempt_number >= self.max_attempts
    }
}

/// How a successful coordinated mutation settled. Failures are returned as
/// errors after rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Committed,
    /// Committed, but the follow-up refresh failed; local state is the
    /// optimistic one
    CommittedStale,
}
