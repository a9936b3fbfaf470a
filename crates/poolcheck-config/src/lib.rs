//! # poolcheck-config
//!
//! TOML fixtures for the poolcheck harness.
//!
//! ## Overview
//!
//! A fixture names the session and lists the pools to verify. The core
//! only ever sees each pool's [`PoolConfig`](poolcheck_contracts::config::PoolConfig);
//! driver-specific `options` stay opaque until the driver reads them.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use poolcheck_config::HarnessConfig;
//!
//! let fixture = HarnessConfig::from_file(Path::new("fixtures/memory.toml"))?.pre_configure();
//! for pool in &fixture.pools {
//!     let config = pool.pool_config();
//! }
//! ```

pub mod fixture;
pub mod loader;

pub use fixture::{HarnessConfig, PoolFixture, SessionFixture};

// ── Tests ─────────────────────────────────────────────────────────────────────
