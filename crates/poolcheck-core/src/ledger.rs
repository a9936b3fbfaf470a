//! The assertion ledger: pass/fail/skip counters and the exit code.
//!
//! Counters are only ever mutated through `record_*`. The exit code is a
//! pure function of the three counters (`derive_exit_code`).

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use poolcheck_contracts::session::Tally;

use crate::report::Reporter;

/// Exit code for a run with at least one failure.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for a run that only skipped.
pub const EXIT_INCONCLUSIVE: i32 = 2;

/// Map the three counters to a process exit code.
///
/// - any failure → 1
/// - skips with no pass → 2 (inconclusive)
/// - otherwise → 0
pub fn derive_exit_code(failed: u64, skipped: u64, passed: u64) -> i32 {
    if failed > 0 {
        EXIT_FAILURE
    } else if skipped > 0 {
        if passed > 0 {
            0
        } else {
            EXIT_INCONCLUSIVE
        }
    } else {
        0
    }
}

/// Pass/fail/skip counters for one session.
#[derive(Debug)]
pub struct Ledger {
    tally: Mutex<Tally>,
    reporter: Reporter,
}

impl Ledger {
    pub fn new(reporter: Reporter) -> Self {
        Self {
            tally: Mutex::new(Tally::default()),
            reporter,
        }
    }

    pub fn record_pass(&self, message: &str) {
        self.reporter.prefixed(Reporter::PASS, message);
        self.lock().passed += 1;
        debug!(outcome = "pass", %message, "assertion recorded");
    }

    /// Emit a failure line. The fail counter moves only when
    /// `counts_as_failure` is true, so expected-fail checks can log without
    /// penalizing the run.
    pub fn record_fail(&self, message: &str, counts_as_failure: bool) {
        self.reporter.prefixed(Reporter::FAIL, message);
        if counts_as_failure {
            self.lock().failed += 1;
        }
        debug!(outcome = "fail", counts_as_failure, %message, "assertion recorded");
    }

    pub fn record_skip(&self, message: &str) {
        self.reporter.prefixed(Reporter::SKIP, message);
        self.lock().skipped += 1;
        debug!(outcome = "skip", %message, "assertion recorded");
    }

    pub fn tally(&self) -> Tally {
        *self.lock()
    }

    pub fn exit_code(&self) -> i32 {
        let t = self.tally();
        derive_exit_code(t.failed, t.skipped, t.passed)
    }

    // A panic caught mid-session may have poisoned the lock; the counters
    // themselves are always consistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
