//! # poolcheck-memory
//!
//! An in-memory `CachePool` used as the reference driver of the poolcheck
//! harness.
//!
//! ## Overview
//!
//! The pool implements the full capability interface: tag lookups under
//! all three strategies, deferred saves with `commit()`, key scans with
//! optional glob patterns, static item caching and detailed dates. It is
//! what the CLI opens for the `memory` driver and what the verifier's own
//! tests run against.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poolcheck_memory::MemoryPool;
//! use poolcheck_contracts::config::PoolConfig;
//!
//! let pool = MemoryPool::new(PoolConfig::default())
//!     .with_fault_reporter(session.fault_reporter());
//! ```

pub mod entry;
pub mod pattern;
pub mod pool;

pub use pattern::KeyPattern;
pub use pool::{MemoryOptions, MemoryPool};

// ── Tests ─────────────────────────────────────────────────────────────────────
