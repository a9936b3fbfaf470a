//! # poolcheck-core
//!
//! The runtime of the poolcheck conformance harness.
//!
//! This crate provides:
//! - The `CachePool` capability trait every backend adapter implements
//! - The assertion `Ledger` and its exit-code rule
//! - The `FaultClassifier` that turns runtime faults, escaped errors and
//!   panics into ledger outcomes
//! - The `Session` controller tying them together for one run
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poolcheck_core::{Session, SessionOptions, report::BufferSink};
//!
//! let sink = BufferSink::new();
//! let session = Session::start(SessionOptions::new("Memory"), Arc::new(sink.clone()));
//! let summary = session.run(|s| verify(s, &pool));
//! std::process::exit(summary.exit_code);
//! ```

pub mod events;
pub mod fault;
pub mod keys;
pub mod ledger;
pub mod process;
pub mod report;
pub mod session;
pub mod traits;

pub use ledger::Ledger;
pub use report::Reporter;
pub use session::{Session, SessionOptions, SessionSummary};
pub use traits::CachePool;
