//! Options every pool exposes to the harness.
//!
//! Driver-specific settings (hosts, credentials) never appear here; they
//! travel as opaque fixture options and are read only by the driver.

use serde::{Deserialize, Serialize};

/// Lifetime assigned to new items when the caller sets none (15 minutes).
pub const DEFAULT_TTL_SECS: u64 = 900;

/// Largest default TTL a fixture may declare (about 136 years).
pub const MAX_TTL_SECS: u64 = u32::MAX as u64;

/// Pool-wide options the verifier relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// TTL in seconds given to freshly fetched items.
    #[serde(default = "default_ttl")]
    pub default_ttl: u64,

    /// Track creation and modification dates on items.
    #[serde(default)]
    pub item_detailed_date: bool,

    /// Hand back the same in-memory snapshot for repeated fetches of a key
    /// until `detach_all_items()` is called.
    #[serde(default = "default_true")]
    pub use_static_item_caching: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL_SECS,
            item_detailed_date: false,
            use_static_item_caching: true,
        }
    }
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_true() -> bool {
    true
}
