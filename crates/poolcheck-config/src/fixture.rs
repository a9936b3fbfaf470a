//! Fixture types deserialized from TOML.
//!
//! A `HarnessConfig` names the session and lists the pools to verify, in
//! the order they will be run. Driver-specific settings live in each pool's
//! `options` table and are passed through untouched.

use serde::{Deserialize, Serialize};

use poolcheck_contracts::{
    config::{PoolConfig, DEFAULT_TTL_SECS},
    error::{HarnessError, HarnessResult},
};

/// Session-level settings.
///
/// Example in TOML:
/// ```toml
/// [session]
/// name = "Memory pool conformance"
/// mute_notices = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFixture {
    /// Printed in the `Begin Test` header.
    #[serde(default = "default_session_name")]
    pub name: String,

    /// Start the session with notice-level faults hidden.
    #[serde(default)]
    pub mute_notices: bool,
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            mute_notices: false,
        }
    }
}

/// One pool to open and verify.
///
/// Example in TOML:
/// ```toml
/// [[pools]]
/// driver = "memory"
/// default_ttl = 900
/// clear = true
/// [pools.options]
/// pattern_matching = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolFixture {
    /// Registry name of the driver, e.g. `"memory"`.
    pub driver: String,

    #[serde(default = "default_ttl")]
    pub default_ttl: u64,

    /// Clear the pool before the CRUD sequence and run its destructive steps.
    #[serde(default = "default_true")]
    pub clear: bool,

    #[serde(default)]
    pub item_detailed_date: bool,

    #[serde(default = "default_true")]
    pub use_static_item_caching: bool,

    /// Driver-specific settings, read only by the driver.
    #[serde(default)]
    pub options: toml::Table,
}

impl PoolFixture {
    /// A fixture for `driver` with every setting at its default.
    pub fn for_driver(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            default_ttl: DEFAULT_TTL_SECS,
            clear: true,
            item_detailed_date: false,
            use_static_item_caching: true,
            options: toml::Table::new(),
        }
    }

    /// The options the core sees.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            default_ttl: self.default_ttl,
            item_detailed_date: self.item_detailed_date,
            use_static_item_caching: self.use_static_item_caching,
        }
    }

    /// Settings applied to every fixture before a run: detailed dates on,
    /// static item caching off, so each fetch reaches the backend.
    pub fn pre_configure(mut self) -> Self {
        self.item_detailed_date = true;
        self.use_static_item_caching = false;
        self
    }

    /// Read a boolean driver option. Missing keys yield `None`.
    pub fn option_bool(&self, name: &str) -> HarnessResult<Option<bool>> {
        match self.options.get(name) {
            None => Ok(None),
            Some(toml::Value::Boolean(b)) => Ok(Some(*b)),
            Some(other) => Err(HarnessError::Config {
                reason: format!(
                    "option '{name}' of driver '{}' must be a boolean, got {}",
                    self.driver,
                    other.type_str()
                ),
            }),
        }
    }

    /// Read a string driver option. Missing keys yield `None`.
    pub fn option_str(&self, name: &str) -> HarnessResult<Option<&str>> {
        match self.options.get(name) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(HarnessError::Config {
                reason: format!(
                    "option '{name}' of driver '{}' must be a string, got {}",
                    self.driver,
                    other.type_str()
                ),
            }),
        }
    }
}

/// The top-level structure deserialized from a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub session: SessionFixture,

    /// Pools in run order.
    #[serde(default)]
    pub pools: Vec<PoolFixture>,
}

fn default_session_name() -> String {
    "Cache pool conformance".to_string()
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_true() -> bool {
    true
}
