//! `MemoryPool`: the reference `CachePool`.
//!
//! Entries live in a `BTreeMap` behind `Arc<Mutex<_>>`. Deferred items are
//! staged separately and only reach the map on `commit()`. Every public
//! operation dispatches its `PoolEvent` before touching state; observers
//! are never called with the state lock held.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, trace};

use poolcheck_contracts::{
    config::PoolConfig,
    error::{HarnessError, HarnessResult},
    item::{CacheItem, ItemMap},
    stats::{DriverStats, IoStats},
    tag::TagStrategy,
};
use poolcheck_core::{
    events::{EventHub, PoolEvent},
    fault::FaultReporter,
    traits::CachePool,
};

use crate::{entry::StoredEntry, pattern::KeyPattern};

/// Characters a key may not contain.
pub const RESERVED_KEY_CHARS: &str = "{}()/\\@:";

/// Driver-specific options of the memory pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOptions {
    /// Accept a pattern argument in `get_all_items`. When false the pool
    /// behaves like a backend without key scans and rejects patterns.
    pub pattern_matching: bool,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self { pattern_matching: true }
    }
}

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub(crate) entries: BTreeMap<String, StoredEntry>,
    pub(crate) deferred: BTreeMap<String, CacheItem>,
    /// Snapshots handed out while static item caching is on.
    pub(crate) attached: HashMap<String, CacheItem>,
    pub(crate) io: IoStats,
}

// ── Public pool ───────────────────────────────────────────────────────────────

pub struct MemoryPool {
    config: PoolConfig,
    options: MemoryOptions,
    pub(crate) state: Arc<Mutex<MemoryState>>,
    events: EventHub,
    faults: FaultReporter,
}

impl MemoryPool {
    pub const DRIVER_NAME: &'static str = "Memory";

    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            options: MemoryOptions::default(),
            state: Arc::new(Mutex::new(MemoryState::default())),
            events: EventHub::new(),
            faults: FaultReporter::detached(),
        }
    }

    pub fn with_options(mut self, options: MemoryOptions) -> Self {
        self.options = options;
        self
    }

    /// Route runtime faults (e.g. saving an already expired item) to a session.
    pub fn with_fault_reporter(mut self, faults: FaultReporter) -> Self {
        self.faults = faults;
        self
    }

    pub fn options(&self) -> MemoryOptions {
        self.options
    }

    fn lock(&self) -> HarnessResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|e| HarnessError::Logic {
            reason: format!("memory pool state lock poisoned: {e}"),
        })
    }

    fn lock_lossy(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `item` to the entry map. The caller holds the lock.
    fn store(&self, state: &mut MemoryState, item: &CacheItem) -> bool {
        let key = item.key().to_string();
        let now = Utc::now();

        if item.expiration() <= now {
            state.entries.remove(&key);
            state.attached.remove(&key);
            return false;
        }

        let entry = StoredEntry::capture(item, state.entries.get(&key), now);
        if self.config.use_static_item_caching {
            state
                .attached
                .insert(key.clone(), entry.to_item(&key, self.config.item_detailed_date));
        }
        state.entries.insert(key, entry);
        state.io.write_hit += 1;
        true
    }

    fn warn_if_expired(&self, item: &CacheItem) {
        if item.is_expired() {
            self.faults.notice(format!(
                "Cache item \"{}\" is already expired and will not be stored",
                item.key()
            ));
        }
    }
}

/// Reject keys a PSR-6 pool must refuse.
pub fn validate_key(key: &str) -> HarnessResult<()> {
    if key.is_empty() {
        return Err(HarnessError::InvalidArgument {
            reason: "cache key must not be empty".to_string(),
        });
    }
    if let Some(c) = key.chars().find(|c| RESERVED_KEY_CHARS.contains(*c)) {
        return Err(HarnessError::InvalidArgument {
            reason: format!("cache key '{key}' contains reserved character '{c}'"),
        });
    }
    Ok(())
}

// ── CachePool impl ────────────────────────────────────────────────────────────

impl CachePool for MemoryPool {
    fn driver_name(&self) -> &str {
        Self::DRIVER_NAME
    }

    fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn get_item(&self, key: &str) -> HarnessResult<CacheItem> {
        validate_key(key)?;
        self.events.dispatch(&PoolEvent::GetItem { key });

        let now = Utc::now();
        let mut guard = self.lock()?;
        let state = &mut *guard;

        if self.config.use_static_item_caching {
            if let Some(item) = state.attached.get(key).cloned() {
                if item.is_hit() && !item.is_expired() {
                    state.io.read_hit += 1;
                } else {
                    state.io.read_miss += 1;
                }
                return Ok(item);
            }
        }

        let live = state
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.to_item(key, self.config.item_detailed_date)));
        let item = match live {
            Some(Some(item)) => {
                state.io.read_hit += 1;
                item
            }
            Some(None) => {
                trace!(key, "dropping expired entry");
                state.entries.remove(key);
                state.io.read_miss += 1;
                CacheItem::miss(key, self.config.default_ttl)
            }
            None => {
                state.io.read_miss += 1;
                CacheItem::miss(key, self.config.default_ttl)
            }
        };

        if self.config.use_static_item_caching {
            state.attached.insert(key.to_string(), item.clone());
        }
        Ok(item)
    }

    fn get_items_by_tags(&self, tags: &[String], strategy: TagStrategy) -> HarnessResult<ItemMap> {
        if tags.is_empty() {
            return Err(HarnessError::InvalidArgument {
                reason: "at least one tag is required".to_string(),
            });
        }
        self.events.dispatch(&PoolEvent::GetItemsByTags { tags });

        let now = Utc::now();
        let mut state = self.lock()?;
        let found: ItemMap = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now) && strategy.matches(&entry.tags, tags))
            .map(|(key, entry)| (key.clone(), entry.to_item(key, self.config.item_detailed_date)))
            .collect();

        state.io.read_hit += found.len() as u64;
        debug!(strategy = %strategy, tags = ?tags, found = found.len(), "tag lookup");
        Ok(found)
    }

    fn get_all_items(&self, pattern: Option<&str>) -> HarnessResult<ItemMap> {
        let pattern = match pattern {
            Some(_) if !self.options.pattern_matching => {
                return Err(HarnessError::InvalidArgument {
                    reason: format!("{} pool does not support key patterns", Self::DRIVER_NAME),
                })
            }
            Some(p) => Some(KeyPattern::compile(p)?),
            None => None,
        };

        // The key scan starts here; observers see it before any entry is read.
        self.events.dispatch(&PoolEvent::GetAllItems {
            pattern: pattern.as_ref().map_or("", KeyPattern::as_str),
        });

        let now = Utc::now();
        let mut state = self.lock()?;
        let found: ItemMap = state
            .entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && pattern.as_ref().map_or(true, |p| p.is_match(key)))
            .map(|(key, entry)| (key.clone(), entry.to_item(key, self.config.item_detailed_date)))
            .collect();

        state.io.read_hit += found.len() as u64;
        debug!(pattern = ?pattern.as_ref().map(KeyPattern::as_str), found = found.len(), "key scan");
        Ok(found)
    }

    fn save(&self, item: &CacheItem) -> HarnessResult<bool> {
        validate_key(item.key())?;
        self.events.dispatch(&PoolEvent::SaveItem { key: item.key() });
        self.warn_if_expired(item);

        let mut state = self.lock()?;
        let saved = self.store(&mut state, item);
        debug!(key = item.key(), saved, "item saved");
        Ok(saved)
    }

    fn save_deferred(&self, item: &CacheItem) -> HarnessResult<bool> {
        validate_key(item.key())?;
        self.events
            .dispatch(&PoolEvent::SaveDeferredItem { key: item.key() });

        let mut state = self.lock()?;
        state.deferred.insert(item.key().to_string(), item.clone());
        Ok(true)
    }

    fn commit(&self) -> HarnessResult<bool> {
        let staged: Vec<CacheItem> = {
            let mut state = self.lock()?;
            std::mem::take(&mut state.deferred).into_values().collect()
        };
        let keys: Vec<String> = staged.iter().map(|i| i.key().to_string()).collect();
        self.events.dispatch(&PoolEvent::CommitItem { keys: &keys });

        for item in &staged {
            self.warn_if_expired(item);
        }

        let mut state = self.lock()?;
        let mut all = true;
        for item in &staged {
            all &= self.store(&mut state, item);
        }
        debug!(committed = staged.len(), all, "deferred items committed");
        Ok(all)
    }

    fn delete_item(&self, key: &str) -> HarnessResult<bool> {
        validate_key(key)?;
        self.events.dispatch(&PoolEvent::DeleteItem { key });

        let mut state = self.lock()?;
        state.entries.remove(key);
        state.deferred.remove(key);
        state.attached.remove(key);
        Ok(true)
    }

    fn clear(&self) -> HarnessResult<bool> {
        self.events.dispatch(&PoolEvent::Clear);

        let mut state = self.lock()?;
        state.entries.clear();
        state.deferred.clear();
        state.attached.clear();
        debug!("memory pool cleared");
        Ok(true)
    }

    fn detach_all_items(&self) {
        self.lock_lossy().attached.clear();
    }

    fn stats(&self) -> DriverStats {
        let state = self.lock_lossy();
        let now = Utc::now();
        let live = state.entries.values().filter(|e| e.is_live(now)).count() as u64;
        DriverStats {
            info: format!(
                "In-memory pool holding {live} item(s) and {} deferred item(s)",
                state.deferred.len()
            ),
            size: state.entries.values().map(StoredEntry::approximate_size).sum(),
            item_count: Some(live),
        }
    }

    fn io(&self) -> IoStats {
        self.lock_lossy().io
    }

    fn events(&self) -> &EventHub {
        &self.events
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use serde_json::json;

    use poolcheck_core::events::{EventFilter, EventKind, InvocationProbe};

    use super::*;

    fn pool() -> MemoryPool {
        MemoryPool::new(PoolConfig::default())
    }

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn save_tagged(pool: &MemoryPool, key: &str, value: &str, item_tags: &[&str]) {
        let mut item = pool.get_item(key).unwrap();
        item.set(value).add_tags(item_tags.iter().copied());
        assert!(pool.save(&item).unwrap());
    }

    #[test]
    fn unknown_key_is_a_miss_with_default_ttl() {
        let pool = pool();
        let item = pool.get_item("absent").unwrap();
        assert!(!item.is_hit());
        assert!((item.ttl() - 900).abs() <= 1);
        assert_eq!(pool.io().read_miss, 1);
    }

    #[test]
    fn save_then_fetch_is_a_hit() {
        let pool = pool();
        save_tagged(&pool, "k", "v", &[]);
        pool.detach_all_items();

        let item = pool.get_item("k").unwrap();
        assert!(item.is_hit());
        assert_eq!(item.get(), &json!("v"));
        assert_eq!(pool.io().write_hit, 1);
    }

    #[test]
    fn tag_strategies() {
        let pool = pool();
        save_tagged(&pool, "k", "v", &["a", "b"]);

        let hit = |q: &[&str], s| pool.get_items_by_tags(&tags(q), s).unwrap().contains_key("k");
        assert!(!hit(&["a", "b", "z"], TagStrategy::All));
        assert!(hit(&["a", "b"], TagStrategy::All));
        assert!(hit(&["a"], TagStrategy::All));
        assert!(!hit(&["a", "b", "z"], TagStrategy::Only));
        assert!(hit(&["a", "b"], TagStrategy::Only));
        assert!(!hit(&["a"], TagStrategy::Only));
        assert!(hit(&["a", "z"], TagStrategy::One));
        assert!(!hit(&["z"], TagStrategy::One));
    }

    #[test]
    fn deferred_items_appear_only_after_commit() {
        let pool = pool();
        let mut item = pool.get_item("d").unwrap();
        item.set("later");
        assert!(pool.save_deferred(&item).unwrap());

        pool.detach_all_items();
        assert!(!pool.get_item("d").unwrap().is_hit());

        assert!(pool.commit().unwrap());
        pool.detach_all_items();
        assert_eq!(pool.get_item("d").unwrap().get(), &json!("later"));
    }

    #[test]
    fn delete_and_clear() {
        let pool = pool();
        save_tagged(&pool, "a", "1", &[]);
        save_tagged(&pool, "b", "2", &[]);
        save_tagged(&pool, "c", "3", &[]);

        assert!(pool.delete_item("a").unwrap());
        assert!(!pool.get_item("a").unwrap().is_hit());

        assert!(pool.delete_items(&tags(&["b"])).unwrap());
        assert!(pool.clear().unwrap());
        pool.detach_all_items();
        assert!(!pool.get_item("c").unwrap().is_hit());
        assert_eq!(pool.stats().item_count, Some(0));
    }

    #[test]
    fn static_caching_serves_the_attached_snapshot() {
        let pool = pool();
        save_tagged(&pool, "k", "v", &[]);
        // Simulate an out-of-band removal.
        pool.state.lock().unwrap().entries.clear();

        assert!(pool.get_item("k").unwrap().is_hit(), "attached snapshot still served");
        pool.detach_all_items();
        assert!(!pool.get_item("k").unwrap().is_hit());
    }

    #[test]
    fn no_static_caching_goes_to_storage_every_time() {
        let pool = MemoryPool::new(PoolConfig {
            use_static_item_caching: false,
            ..PoolConfig::default()
        });
        save_tagged(&pool, "k", "v", &[]);
        pool.state.lock().unwrap().entries.clear();
        assert!(!pool.get_item("k").unwrap().is_hit());
    }

    #[test]
    fn detailed_dates_follow_the_config() {
        let pool = MemoryPool::new(PoolConfig {
            item_detailed_date: true,
            ..PoolConfig::default()
        });
        save_tagged(&pool, "k", "v", &[]);
        pool.detach_all_items();
        let item = pool.get_item("k").unwrap();
        assert!(item.created_at().is_some());
        assert!(item.modified_at().is_some());
    }

    #[test]
    fn expired_items_are_not_stored() {
        let pool = pool();
        let mut item = pool.get_item("old").unwrap();
        item.set("x").expires_at(Utc::now() - Duration::seconds(10));
        assert!(!pool.save(&item).unwrap());
        pool.detach_all_items();
        assert!(!pool.get_item("old").unwrap().is_hit());
    }

    #[test]
    fn expired_entry_is_dropped_on_fetch() {
        let pool = MemoryPool::new(PoolConfig {
            use_static_item_caching: false,
            ..PoolConfig::default()
        });
        save_tagged(&pool, "k", "v", &[]);
        pool.state.lock().unwrap().entries.get_mut("k").unwrap().expiration =
            Utc::now() - Duration::seconds(1);

        let item = pool.get_item("k").unwrap();
        assert!(!item.is_hit());
        assert!(pool.state.lock().unwrap().entries.is_empty());
        let io = pool.io();
        assert_eq!((io.read_hit, io.read_miss), (0, 2));
    }

    #[test]
    fn get_all_items_with_and_without_pattern() {
        let pool = pool();
        for n in 1..=3 {
            save_tagged(&pool, &format!("cache-test{n}"), "v", &[]);
        }

        let probe = Arc::new(InvocationProbe::new());
        let token = pool
            .events()
            .subscribe(EventFilter::Only(EventKind::GetAllItems), probe.clone());

        assert_eq!(pool.get_all_items(None).unwrap().len(), 3);
        let one = pool.get_all_items(Some("*test1*")).unwrap();
        assert_eq!(one.keys().collect::<Vec<_>>(), vec!["cache-test1"]);
        assert_eq!(probe.invocations(), 2);
        assert!(pool.events().unsubscribe(token));
    }

    #[test]
    fn pattern_rejected_when_matching_is_disabled() {
        let pool = pool().with_options(MemoryOptions { pattern_matching: false });
        assert!(matches!(
            pool.get_all_items(Some("*")),
            Err(HarnessError::InvalidArgument { .. })
        ));
        assert!(pool.get_all_items(None).unwrap().is_empty());
    }

    #[test]
    fn reserved_characters_are_rejected() {
        let pool = pool();
        for key in ["", "a{b", "a/b", "a@b", "a:b"] {
            assert!(
                matches!(pool.get_item(key), Err(HarnessError::InvalidArgument { .. })),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn stats_report_size_and_count() {
        let pool = pool();
        save_tagged(&pool, "k", "some payload", &["t"]);
        let stats = pool.stats();
        assert_eq!(stats.item_count, Some(1));
        assert!(stats.size > 0);
        assert!(stats.info.contains("1 item(s)"));
    }
}
