//! Stored representation of one cache entry.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use poolcheck_contracts::item::CacheItem;

/// What the pool keeps for a key between a save and the next fetch.
///
/// Items handed to callers are rebuilt from this on every fetch, so a
/// caller mutating its `CacheItem` never alters stored state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEntry {
    pub value: Value,
    pub expiration: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl StoredEntry {
    /// Capture `item` for storage.
    ///
    /// `previous` is the entry being overwritten, if any; its creation date
    /// is carried over.
    pub fn capture(item: &CacheItem, previous: Option<&StoredEntry>, now: DateTime<Utc>) -> Self {
        Self {
            value: item.get().clone(),
            expiration: item.expiration(),
            tags: item.tags().clone(),
            created_at: previous.map_or(now, |p| p.created_at),
            modified_at: now,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expiration > now
    }

    /// Rebuild the caller-facing item for `key`.
    pub fn to_item(&self, key: &str, detailed_dates: bool) -> CacheItem {
        let mut item = CacheItem::restored(key, self.value.clone(), self.expiration, self.tags.clone());
        if detailed_dates {
            item.set_dates(self.created_at, self.modified_at);
        }
        item
    }

    /// Approximate footprint: the JSON size of the payload plus tag bytes.
    pub fn approximate_size(&self) -> u64 {
        let payload = serde_json::to_vec(&self.value).map_or(0, |v| v.len());
        let tags: usize = self.tags.iter().map(String::len).sum();
        (payload + tags) as u64
    }
}
