//! Session identity and outcome counters.

use serde::{Deserialize, Serialize};

/// Unique identifier for one harness session.
///
/// Appears in every structured log line the session emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the three ledger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub failed: u64,
    pub passed: u64,
    pub skipped: u64,
}

impl Tally {
    pub fn total(&self) -> u64 {
        self.failed + self.passed + self.skipped
    }
}
