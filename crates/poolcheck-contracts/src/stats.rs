//! Observational counters reported by pools.
//!
//! The harness prints these after a CRUD run. They carry no pass/fail
//! meaning.

use serde::{Deserialize, Serialize};

/// Read/write hit counters accumulated by a pool since it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoStats {
    pub read_hit: u64,
    pub read_miss: u64,
    pub write_hit: u64,
}

/// Backend description and approximate footprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStats {
    /// Free-form description supplied by the driver.
    pub info: String,
    /// Approximate storage size in bytes. Zero when unknown.
    pub size: u64,
    /// Number of live items, when the backend can tell.
    pub item_count: Option<u64>,
}
