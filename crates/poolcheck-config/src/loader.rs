//! Loading and validating fixture files.

use std::path::Path;

use tracing::{debug, warn};

use poolcheck_contracts::{
    config::MAX_TTL_SECS,
    error::{HarnessError, HarnessResult},
};

use crate::fixture::{HarnessConfig, PoolFixture};

impl HarnessConfig {
    /// Parse `s` as a TOML fixture and validate it.
    ///
    /// Returns `HarnessError::Config` if the TOML is malformed, does not
    /// match the fixture schema, or fails validation.
    pub fn from_toml_str(s: &str) -> HarnessResult<Self> {
        let config: HarnessConfig = toml::from_str(s).map_err(|e| HarnessError::Config {
            reason: format!("failed to parse fixture TOML: {e}"),
        })?;
        config.validate()?;
        debug!(session = %config.session.name, pools = config.pools.len(), "fixture loaded");
        Ok(config)
    }

    /// Read the file at `path` and parse it as a fixture.
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| HarnessError::Config {
            reason: format!("failed to read fixture file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// A single-pool fixture for `driver` with default settings.
    pub fn for_driver(driver: &str) -> Self {
        Self {
            pools: vec![PoolFixture::for_driver(driver)],
            ..Self::default()
        }
    }

    /// Apply `PoolFixture::pre_configure` to every pool.
    pub fn pre_configure(mut self) -> Self {
        self.pools = self.pools.into_iter().map(PoolFixture::pre_configure).collect();
        self
    }

    fn validate(&self) -> HarnessResult<()> {
        if self.pools.is_empty() {
            warn!("fixture declares no pools; nothing will be verified");
        }
        for (index, pool) in self.pools.iter().enumerate() {
            if pool.driver.trim().is_empty() {
                return Err(HarnessError::Config {
                    reason: format!("pool #{index} has an empty driver name"),
                });
            }
            if pool.default_ttl == 0 {
                return Err(HarnessError::Config {
                    reason: format!("pool #{index} ('{}') must have a positive default_ttl", pool.driver),
                });
            }
            if pool.default_ttl > MAX_TTL_SECS {
                return Err(HarnessError::Config {
                    reason: format!(
                        "pool #{index} ('{}') default_ttl {} exceeds the {MAX_TTL_SECS}s limit",
                        pool.driver, pool.default_ttl
                    ),
                });
            }
        }
        Ok(())
    }
}
