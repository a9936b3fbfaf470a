//! # poolcheck-verify
//!
//! Contract verification sequences for cache pools.
//!
//! This crate provides [`ContractVerifier`], which drives any
//! [`poolcheck_core::CachePool`] through two fixed sequences and records
//! every expectation in the session ledger:
//!
//! 1. **CRUD** (`run_crud`): default TTL, save, tag strategies ALL / ONLY /
//!    ONE, deferred save + commit, delete, clear and batch delete.
//! 2. **Bulk retrieval** (`run_get_all_items`): key scan with and without a
//!    pattern, and proof that the scan's extensibility point fired.
//!
//! Assertion failures are recorded and, where later steps would be
//! meaningless, end the sequence early. Errors returned by the pool are not
//! handled here; they escape through `?` and are classified by the session.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use poolcheck_verify::ContractVerifier;
//!
//! let summary = session.run(|s| {
//!     let verifier = ContractVerifier::new(s);
//!     verifier.run_crud(&pool, true)?;
//!     verifier.run_get_all_items(&pool)
//! });
//! ```

pub mod bulk;
pub mod crud;

use poolcheck_core::{Ledger, Reporter, Session};

/// Runs verification sequences against a pool, recording into a ledger.
#[derive(Debug, Clone, Copy)]
pub struct ContractVerifier<'a> {
    ledger: &'a Ledger,
    reporter: &'a Reporter,
}

impl<'a> ContractVerifier<'a> {
    /// A verifier recording into `session`'s ledger.
    pub fn new(session: &'a Session) -> Self {
        Self::from_parts(session.ledger(), session.reporter())
    }

    pub fn from_parts(ledger: &'a Ledger, reporter: &'a Reporter) -> Self {
        Self { ledger, reporter }
    }

    pub(crate) fn pass(&self, message: &str) {
        self.ledger.record_pass(message);
    }

    pub(crate) fn fail(&self, message: &str) {
        self.ledger.record_fail(message, true);
    }

    pub(crate) fn skip(&self, message: &str) {
        self.ledger.record_skip(message);
    }

    pub(crate) fn reporter(&self) -> &Reporter {
        self.reporter
    }
}
