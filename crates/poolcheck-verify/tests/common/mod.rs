//! Shared fixtures for the verifier integration tests.
//!
//! `FaultyPool` wraps the reference memory pool and breaks exactly one part
//! of the contract, so each test can check the verifier notices.

#![allow(dead_code)]

use std::sync::Arc;

use poolcheck_contracts::{
    config::PoolConfig,
    error::{HarnessError, HarnessResult},
    item::{CacheItem, ItemMap},
    stats::{DriverStats, IoStats},
    tag::TagStrategy,
};
use poolcheck_core::{
    events::EventHub, report::BufferSink, CachePool, Session, SessionOptions,
};
use poolcheck_memory::MemoryPool;

/// Which part of the contract the pool breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every tag strategy behaves like ONE.
    AnyTag,
    /// ONLY accepts items whose tags are a subset of the query.
    SubsetOnly,
    /// Deferred saves are dropped and `commit()` reports failure.
    DropsCommit,
    /// `save()` reports success without storing anything.
    LyingSave,
    /// Fresh items get a 10 second TTL whatever the configured default.
    ShortTtl,
    /// Every fetch fails with a connection error.
    Unreachable,
    /// `get_all_items` is not implemented.
    NoScan,
    /// The key scan runs without dispatching its event.
    SilentScan,
}

pub struct FaultyPool {
    inner: MemoryPool,
    fault: Fault,
    silent_hub: EventHub,
}

impl FaultyPool {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: MemoryPool::new(PoolConfig::default()),
            fault,
            silent_hub: EventHub::new(),
        }
    }
}

impl CachePool for FaultyPool {
    fn driver_name(&self) -> &str {
        "Faulty"
    }

    fn config(&self) -> &PoolConfig {
        self.inner.config()
    }

    fn get_item(&self, key: &str) -> HarnessResult<CacheItem> {
        match self.fault {
            Fault::Unreachable => Err(HarnessError::DriverConnect {
                driver: "Faulty".into(),
                reason: "connection refused".into(),
            }),
            Fault::ShortTtl => {
                let mut item = self.inner.get_item(key)?;
                if !item.is_hit() {
                    item.expires_after(10);
                }
                Ok(item)
            }
            _ => self.inner.get_item(key),
        }
    }

    fn get_items_by_tags(&self, tags: &[String], strategy: TagStrategy) -> HarnessResult<ItemMap> {
        match self.fault {
            Fault::AnyTag => self.inner.get_items_by_tags(tags, TagStrategy::One),
            Fault::SubsetOnly if strategy == TagStrategy::Only => {
                let candidates = self.inner.get_items_by_tags(tags, TagStrategy::One)?;
                Ok(candidates
                    .into_iter()
                    .filter(|(_, item)| item.tags().iter().all(|t| tags.contains(t)))
                    .collect())
            }
            _ => self.inner.get_items_by_tags(tags, strategy),
        }
    }

    fn get_all_items(&self, pattern: Option<&str>) -> HarnessResult<ItemMap> {
        match self.fault {
            Fault::NoScan => Err(HarnessError::UnsupportedMethod {
                method: "get_all_items".into(),
            }),
            _ => self.inner.get_all_items(pattern),
        }
    }

    fn save(&self, item: &CacheItem) -> HarnessResult<bool> {
        match self.fault {
            Fault::LyingSave => Ok(true),
            _ => self.inner.save(item),
        }
    }

    fn save_deferred(&self, item: &CacheItem) -> HarnessResult<bool> {
        match self.fault {
            Fault::DropsCommit => Ok(true),
            _ => self.inner.save_deferred(item),
        }
    }

    fn commit(&self) -> HarnessResult<bool> {
        match self.fault {
            Fault::DropsCommit => Ok(false),
            _ => self.inner.commit(),
        }
    }

    fn delete_item(&self, key: &str) -> HarnessResult<bool> {
        self.inner.delete_item(key)
    }

    fn clear(&self) -> HarnessResult<bool> {
        self.inner.clear()
    }

    fn detach_all_items(&self) {
        self.inner.detach_all_items()
    }

    fn stats(&self) -> DriverStats {
        self.inner.stats()
    }

    fn io(&self) -> IoStats {
        self.inner.io()
    }

    fn events(&self) -> &EventHub {
        match self.fault {
            Fault::SilentScan => &self.silent_hub,
            _ => self.inner.events(),
        }
    }
}

/// A session writing into a buffer, without headers.
pub fn quiet_session(name: &str) -> (Session, BufferSink) {
    let sink = BufferSink::new();
    let session = Session::start(
        SessionOptions::new(name).print_headers(false),
        Arc::new(sink.clone()),
    );
    (session, sink)
}

pub fn memory_pool() -> MemoryPool {
    MemoryPool::new(PoolConfig::default())
}
