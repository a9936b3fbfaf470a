//! Fault classification: runtime faults, escaped errors, and panics.
//!
//! Two interception points feed the ledger:
//!
//! 1. **Runtime faults** raised through a `FaultReporter`. Masked
//!    severities are dropped; `Fatal` becomes a failure; everything else is
//!    printed as a debug note.
//! 2. **Uncaught errors and panics** escaping a verification body. Driver
//!    availability problems become skips, anything else a failure. The
//!    session terminates right after (see `session::Session::run`).
//!
//! The panic interception point is a process-wide hook. Each session holds
//! a `PanicScope`; the hook is installed by the first live scope and the
//! previous one is restored when the last scope is dropped.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use poolcheck_contracts::{
    error::{HarnessError, SourceLocation, Uncaught},
    fault::{ExceptionOutcome, FaultRecord, Severity, SeverityMask},
};

use crate::{ledger::Ledger, report::Reporter};

/// Placeholder used when an escaped error carries no message.
pub const NO_MESSAGE: &str = "[No message provided]";

/// What the classifier did with a runtime fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDisposition {
    /// The severity is masked; nothing was printed or recorded.
    Masked,
    /// The fault was fatal and recorded as a failure.
    Failed,
    /// The fault was printed as a debug note only.
    Noted,
}

/// Maps faults and escaped errors to ledger outcomes.
#[derive(Debug)]
pub struct FaultClassifier {
    ledger: Arc<Ledger>,
    reporter: Reporter,
    mask: AtomicU8,
    project_dir: PathBuf,
}

impl FaultClassifier {
    pub fn new(ledger: Arc<Ledger>, reporter: Reporter, project_dir: PathBuf, mask: SeverityMask) -> Self {
        Self {
            ledger,
            reporter,
            mask: AtomicU8::new(mask.bits()),
            project_dir,
        }
    }

    pub fn mask(&self) -> SeverityMask {
        SeverityMask::from_bits(self.mask.load(Ordering::SeqCst))
    }

    pub fn set_mask(&self, mask: SeverityMask) {
        self.mask.store(mask.bits(), Ordering::SeqCst);
    }

    /// Handle one runtime fault.
    pub fn handle_fault(&self, record: &FaultRecord) -> FaultDisposition {
        if !self.mask().contains(record.severity) {
            return FaultDisposition::Masked;
        }

        let file = self.relative_path(&record.location.file);
        let line = record.location.line;
        let described = format!("{} {}", record.severity.label(), record.message);

        if record.severity == Severity::Fatal {
            self.ledger.record_fail(
                &format!(
                    "<red>A critical error has been caught:</red> <light_red>\"{described}\" in {file} line {line}</light_red>"
                ),
                true,
            );
            FaultDisposition::Failed
        } else {
            debug!(severity = ?record.severity, message = %record.message, %file, line, "non-critical fault");
            self.reporter.debug(&format!(
                "<yellow>A non-critical error has been caught:</yellow> <light_cyan>\"{described}\" in {file} line {line}</light_cyan>"
            ));
            FaultDisposition::Noted
        }
    }

    /// Classify an error that escaped a verification body.
    pub fn classify_error(&self, uncaught: &Uncaught) -> ExceptionOutcome {
        match &uncaught.error {
            HarnessError::DriverCheck { .. } => ExceptionOutcome::DriverUnavailable {
                message: uncaught.error.to_string(),
            },
            HarnessError::DriverConnect { .. } => ExceptionOutcome::DriverConnectFailure {
                message: uncaught.error.to_string(),
            },
            other => ExceptionOutcome::UncaughtOther {
                class: other.class_name().to_string(),
                message: other.reason().into_owned(),
                location: Some(uncaught.location.clone()),
            },
        }
    }

    /// Classify a panic payload caught at the session boundary.
    pub fn classify_panic(payload: &(dyn Any + Send), location: Option<SourceLocation>) -> ExceptionOutcome {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::new()
        };
        ExceptionOutcome::UncaughtOther {
            class: "panic".to_string(),
            message,
            location,
        }
    }

    /// Record an escaped error's outcome in the ledger.
    pub fn handle_uncaught(&self, outcome: &ExceptionOutcome) {
        match outcome {
            ExceptionOutcome::DriverUnavailable { message } => {
                self.ledger.record_skip(&format!(
                    "A driver could not be initialized due to missing requirement: {message}"
                ));
            }
            ExceptionOutcome::DriverConnectFailure { message } => {
                self.ledger.record_skip(&format!(
                    "A driver could not be initialized due to network/authentication issue: {message}"
                ));
            }
            ExceptionOutcome::UncaughtOther { class, message, location } => {
                let (file, line) = match location {
                    Some(loc) => (self.relative_path(&loc.file), loc.line),
                    None => ("[unknown]".to_string(), 0),
                };
                let message = if message.is_empty() { NO_MESSAGE } else { message.as_str() };
                warn!(%class, %file, line, %message, "uncaught error escaped verification");
                self.ledger.record_fail(
                    &format!(
                        "<red>Uncaught exception</red> <light_red>\"{class}\"</light_red> <red>in</red> <light_red>\"{file}\"</light_red> <red>line</red> <light_red>{line}</light_red> <red>with message</red>: <light_red>\"{message}\"</light_red>"
                    ),
                    true,
                );
            }
        }
    }

    /// Render `file` relative to the session root as `~/…`.
    ///
    /// Relative paths (the usual form of `Location::file()`) are taken to be
    /// relative to the root already. Absolute paths outside the root are
    /// returned unchanged.
    pub fn relative_path(&self, file: &str) -> String {
        let path = Path::new(file);
        let relative = if path.is_absolute() {
            match path.strip_prefix(&self.project_dir) {
                Ok(rel) => rel,
                Err(_) => return file.replace('\\', "/"),
            }
        } else {
            path
        };
        format!("~/{}", relative.to_string_lossy().replace('\\', "/"))
    }
}

/// Cloneable handle pools use to raise runtime faults.
///
/// The handle does not keep the session alive. Faults raised after the
/// session ended are logged through `tracing` and otherwise dropped.
#[derive(Debug, Clone, Default)]
pub struct FaultReporter {
    classifier: Weak<FaultClassifier>,
}

impl FaultReporter {
    pub(crate) fn new(classifier: &Arc<FaultClassifier>) -> Self {
        Self {
            classifier: Arc::downgrade(classifier),
        }
    }

    /// A reporter attached to no session.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.classifier.strong_count() > 0
    }

    /// Raise a fault located at the caller.
    #[track_caller]
    pub fn raise(&self, severity: Severity, message: impl Into<String>) -> Option<FaultDisposition> {
        let record = FaultRecord {
            severity,
            message: message.into(),
            location: SourceLocation::caller(),
        };
        match self.classifier.upgrade() {
            Some(classifier) => Some(classifier.handle_fault(&record)),
            None => {
                warn!(
                    severity = ?record.severity,
                    message = %record.message,
                    location = %record.location,
                    "fault raised outside of a session"
                );
                None
            }
        }
    }

    #[track_caller]
    pub fn notice(&self, message: impl Into<String>) -> Option<FaultDisposition> {
        self.raise(Severity::Notice, message)
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) -> Option<FaultDisposition> {
        self.raise(Severity::RecoverableWarning, message)
    }

    #[track_caller]
    pub fn deprecated(&self, message: impl Into<String>) -> Option<FaultDisposition> {
        self.raise(Severity::Deprecated, message)
    }

    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) -> Option<FaultDisposition> {
        self.raise(Severity::Fatal, message)
    }
}

// ── Panic interception ───────────────────────────────────────────────────────

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

thread_local! {
    static CATCHING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<SourceLocation>> = const { RefCell::new(None) };
}

/// Keeps the session panic hook installed; the previous hook is restored
/// when the last live scope is dropped.
///
/// While a body runs under `catch_panic`, the hook records the panic
/// location for the classifier and stays silent. Outside of it, panics are
/// forwarded to the previously installed hook. Scopes may overlap and be
/// dropped in any order.
pub struct PanicScope {
    _private: (),
}

struct HookState {
    scopes: usize,
    /// The hook found when ours was installed; `None` while ours is not.
    previous: Option<Arc<PanicHook>>,
}

static HOOK: Mutex<HookState> = Mutex::new(HookState {
    scopes: 0,
    previous: None,
});

fn hook_state() -> MutexGuard<'static, HookState> {
    HOOK.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PanicScope {
    pub fn install() -> Self {
        let mut state = hook_state();
        if state.previous.is_none() {
            let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
            let forward = Arc::clone(&previous);
            panic::set_hook(Box::new(move |info| {
                if CATCHING.with(Cell::get) {
                    let location = info.location().map(SourceLocation::from);
                    LAST_PANIC.with(|slot| *slot.borrow_mut() = location);
                } else {
                    (forward)(info);
                }
            }));
            state.previous = Some(previous);
        }
        state.scopes += 1;
        Self { _private: () }
    }
}

impl Drop for PanicScope {
    fn drop(&mut self) {
        let mut state = hook_state();
        state.scopes = state.scopes.saturating_sub(1);
        // Swapping hooks while unwinding would abort the process. The
        // installed hook keeps forwarding, and the next scope reuses it.
        if state.scopes > 0 || std::thread::panicking() {
            return;
        }
        if let Some(previous) = state.previous.take() {
            drop(panic::take_hook());
            panic::set_hook(Box::new(move |info| (previous)(info)));
        }
    }
}

impl std::fmt::Debug for PanicScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicScope").finish_non_exhaustive()
    }
}

/// A panic caught by `catch_panic`.
pub struct CaughtPanic {
    pub payload: Box<dyn Any + Send>,
    pub location: Option<SourceLocation>,
}

/// Run `f`, converting a panic into `Err(CaughtPanic)`.
///
/// The location is only available when a `PanicScope` hook is installed.
pub fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, CaughtPanic> {
    let was_catching = CATCHING.with(|c| c.replace(true));
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CATCHING.with(|c| c.set(was_catching));

    result.map_err(|payload| CaughtPanic {
        payload,
        location: LAST_PANIC.with(|slot| slot.borrow_mut().take()),
    })
}
