//! Driver registry: turns a pool fixture into an open `CachePool`.

use tracing::debug;

use poolcheck_config::PoolFixture;
use poolcheck_contracts::error::{HarnessError, HarnessResult};
use poolcheck_core::{fault::FaultReporter, CachePool};
use poolcheck_memory::{MemoryOptions, MemoryPool};

/// Driver names this binary can open.
pub const DRIVERS: &[&str] = &["memory"];

/// Open the pool described by `fixture`.
///
/// An unknown driver name is reported as `HarnessError::DriverCheck`, which
/// the session records as a skip.
pub fn open(fixture: &PoolFixture, faults: FaultReporter) -> HarnessResult<Box<dyn CachePool>> {
    debug!(driver = %fixture.driver, "opening pool");
    match fixture.driver.to_ascii_lowercase().as_str() {
        "memory" => {
            let options = MemoryOptions {
                pattern_matching: fixture
                    .option_bool("pattern_matching")?
                    .unwrap_or(MemoryOptions::default().pattern_matching),
            };
            Ok(Box::new(
                MemoryPool::new(fixture.pool_config())
                    .with_options(options)
                    .with_fault_reporter(faults),
            ))
        }
        other => Err(HarnessError::DriverCheck {
            driver: other.to_string(),
            reason: format!("no driver registered under this name (available: {})", DRIVERS.join(", ")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use poolcheck_config::HarnessConfig;

    use super::*;

    #[test]
    fn memory_driver_reads_its_options() {
        let config = HarnessConfig::from_toml_str(
            r#"
            [[pools]]
            driver = "Memory"
            [pools.options]
            pattern_matching = false
            "#,
        )
        .unwrap();

        let pool = open(&config.pools[0], FaultReporter::detached()).unwrap();
        assert_eq!(pool.driver_name(), "Memory");
        assert!(matches!(
            pool.get_all_items(Some("*")),
            Err(HarnessError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn unknown_driver_is_a_driver_check_error() {
        let fixture = PoolFixture::for_driver("redis");
        match open(&fixture, FaultReporter::detached()) {
            Err(HarnessError::DriverCheck { driver, .. }) => assert_eq!(driver, "redis"),
            Err(other) => panic!("expected DriverCheck, got {other:?}"),
            Ok(_) => panic!("redis is not registered"),
        }
    }
}
