//! Cache item values exchanged between the harness and a pool.
//!
//! A `CacheItem` is a detached snapshot: mutating it never touches the pool
//! until it is handed back through `save()` or `save_deferred()`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HarnessError, HarnessResult};

/// Items returned by multi-key operations, keyed by cache key.
pub type ItemMap = BTreeMap<String, CacheItem>;

/// A key/value cache entry as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheItem {
    key: String,
    value: Value,
    expiration: DateTime<Utc>,
    tags: BTreeSet<String>,
    hit: bool,
    created_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
}

impl CacheItem {
    /// A fresh item for a key the pool does not hold.
    ///
    /// The value is `null` and the expiration is `default_ttl_secs` from now.
    pub fn miss(key: impl Into<String>, default_ttl_secs: u64) -> Self {
        Self {
            key: key.into(),
            value: Value::Null,
            expiration: expires_in(Utc::now(), default_ttl_secs),
            tags: BTreeSet::new(),
            hit: false,
            created_at: None,
            modified_at: None,
        }
    }

    /// An item reconstructed from stored state.
    pub fn restored(
        key: impl Into<String>,
        value: Value,
        expiration: DateTime<Utc>,
        tags: BTreeSet<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            expiration,
            tags,
            hit: true,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &Value {
        &self.value
    }

    pub fn is_hit(&self) -> bool {
        self.hit
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    /// Remaining lifetime in whole seconds, rounded down.
    pub fn ttl(&self) -> i64 {
        self.ttl_at(Utc::now())
    }

    /// Remaining lifetime in whole seconds at `now`, rounded down.
    pub fn ttl_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expiration - now).num_milliseconds().div_euclid(1000)
    }

    pub fn is_expired(&self) -> bool {
        self.expiration <= Utc::now()
    }

    pub fn set(&mut self, value: impl Into<Value>) -> &mut Self {
        self.value = value.into();
        self
    }

    /// Append `suffix` to a string payload.
    ///
    /// Fails with `InvalidArgument` when the payload is not a string; a
    /// `null` payload is treated as the empty string.
    pub fn append(&mut self, suffix: &str) -> HarnessResult<&mut Self> {
        match &mut self.value {
            Value::String(s) => s.push_str(suffix),
            Value::Null => self.value = Value::String(suffix.to_string()),
            other => {
                return Err(HarnessError::InvalidArgument {
                    reason: format!("cannot append to a non-string payload ({other})"),
                })
            }
        }
        Ok(self)
    }

    pub fn expires_after(&mut self, ttl_secs: u64) -> &mut Self {
        self.expiration = expires_in(Utc::now(), ttl_secs);
        self
    }

    pub fn expires_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.expiration = at;
        self
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn add_tags<T: Into<String>>(&mut self, tags: impl IntoIterator<Item = T>) -> &mut Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn remove_tag(&mut self, tag: &str) -> &mut Self {
        self.tags.remove(tag);
        self
    }

    /// Set by pools configured to track detailed dates.
    pub fn set_dates(&mut self, created_at: DateTime<Utc>, modified_at: DateTime<Utc>) -> &mut Self {
        self.created_at = Some(created_at);
        self.modified_at = Some(modified_at);
        self
    }
}

/// `now + ttl_secs`, saturating at the latest representable date.
pub fn expires_in(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
