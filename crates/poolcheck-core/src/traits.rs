//! The capability interface a cache pool exposes to the harness.
//!
//! Backends with a different native surface are expected to provide an
//! adapter implementing `CachePool`; the verifier never branches on the
//! concrete pool type.

use poolcheck_contracts::{
    config::PoolConfig,
    error::{HarnessError, HarnessResult},
    item::{CacheItem, ItemMap},
    stats::{DriverStats, IoStats},
    tag::TagStrategy,
};

use crate::events::EventHub;

/// A PSR-6 style cache pool.
///
/// All methods take `&self`; implementations keep their state behind
/// interior mutability so a pool can be shared with observers and fault
/// reporters.
pub trait CachePool: Send + Sync {
    /// Human-readable driver name (e.g. "Memory").
    fn driver_name(&self) -> &str;

    /// The options the pool was opened with.
    fn config(&self) -> &PoolConfig;

    /// Fetch one item. A key the pool does not hold yields a miss item
    /// carrying the default TTL.
    fn get_item(&self, key: &str) -> HarnessResult<CacheItem>;

    /// Fetch several items. The result holds one entry per requested key,
    /// hits and misses alike.
    fn get_items(&self, keys: &[String]) -> HarnessResult<ItemMap> {
        keys.iter()
            .map(|k| self.get_item(k).map(|item| (k.clone(), item)))
            .collect()
    }

    /// Fetch the live items answering `tags` under `strategy`. Only hits
    /// are returned.
    fn get_items_by_tags(&self, tags: &[String], strategy: TagStrategy) -> HarnessResult<ItemMap>;

    /// Fetch every live item, optionally narrowed by a glob-style key
    /// pattern. Pools that cannot match patterns fail with
    /// `HarnessError::InvalidArgument` when `pattern` is given.
    fn get_all_items(&self, pattern: Option<&str>) -> HarnessResult<ItemMap> {
        let _ = pattern;
        Err(HarnessError::UnsupportedMethod {
            method: "get_all_items".to_string(),
        })
    }

    /// Persist an item immediately.
    fn save(&self, item: &CacheItem) -> HarnessResult<bool>;

    /// Stage an item; it becomes durable on `commit()`.
    fn save_deferred(&self, item: &CacheItem) -> HarnessResult<bool>;

    /// Persist several items immediately. True only if every save succeeded.
    fn save_multiple(&self, items: &[CacheItem]) -> HarnessResult<bool> {
        let mut all = true;
        for item in items {
            all &= self.save(item)?;
        }
        Ok(all)
    }

    /// Persist every staged item.
    fn commit(&self) -> HarnessResult<bool>;

    fn delete_item(&self, key: &str) -> HarnessResult<bool>;

    fn delete_items(&self, keys: &[String]) -> HarnessResult<bool> {
        let mut all = true;
        for key in keys {
            all &= self.delete_item(key)?;
        }
        Ok(all)
    }

    /// Remove every item, staged ones included.
    fn clear(&self) -> HarnessResult<bool>;

    /// Drop any in-memory item snapshots so the next fetch goes to the backend.
    fn detach_all_items(&self);

    fn stats(&self) -> DriverStats;

    fn io(&self) -> IoStats;

    /// The pool's event subscription point.
    fn events(&self) -> &EventHub;
}
