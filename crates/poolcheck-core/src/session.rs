//! The session controller.
//!
//! A `Session` owns everything that lives for exactly one harness run:
//!
//!   start → headers → [verification body] → footer → exit code
//!
//! Fault handling is installed in `Session::start` and torn down when the
//! session is consumed by `run()` or `terminate()`, or simply dropped. An
//! error or panic escaping the body passed to `run()` is classified, recorded
//! and ends the session; control never returns to the body.

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use poolcheck_contracts::{
    error::{HarnessResult, StepResult},
    fault::SeverityMask,
    session::{SessionId, Tally},
};

use crate::{
    events::{EventFilter, PoolEvent, PoolObserver, SubscriptionToken},
    fault::{catch_panic, FaultClassifier, FaultReporter, PanicScope},
    ledger::{derive_exit_code, Ledger},
    process,
    report::{OutputSink, Reporter},
    traits::CachePool,
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Running,
    /// An uncaught error was recorded; only the footer remains.
    Terminating,
    Exited(i32),
}

/// How to start a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub name: String,
    /// Root used to shorten source paths in failure messages.
    pub project_dir: PathBuf,
    pub mute_notices: bool,
    pub print_headers: bool,
}

impl SessionOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            mute_notices: false,
            print_headers: true,
        }
    }

    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    pub fn mute_notices(mut self, mute: bool) -> Self {
        self.mute_notices = mute;
        self
    }

    pub fn print_headers(mut self, print: bool) -> Self {
        self.print_headers = print;
        self
    }
}

/// Read-only view of a running session, for diagnostics and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDiagnostics {
    pub id: SessionId,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub tally: Tally,
    pub state: SessionState,
    pub severity_mask: SeverityMask,
}

/// Final report of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub tally: Tally,
    pub duration: Duration,
    pub peak_memory: Option<u64>,
    pub exit_code: i32,
}

/// One harness run.
pub struct Session {
    id: SessionId,
    name: String,
    started_at: DateTime<Utc>,
    clock: Instant,
    project_dir: PathBuf,
    reporter: Reporter,
    ledger: Arc<Ledger>,
    classifier: Arc<FaultClassifier>,
    state: Cell<SessionState>,
    _panic_scope: PanicScope,
}

impl Session {
    /// Start a session: install fault handling and print the headers.
    pub fn start(options: SessionOptions, sink: Arc<dyn OutputSink>) -> Self {
        let reporter = Reporter::new(sink);
        let ledger = Arc::new(Ledger::new(reporter.clone()));
        let mask = if options.mute_notices {
            SeverityMask::WITHOUT_NOTICES
        } else {
            SeverityMask::FULL
        };
        let classifier = Arc::new(FaultClassifier::new(
            Arc::clone(&ledger),
            reporter.clone(),
            options.project_dir.clone(),
            mask,
        ));

        let session = Self {
            id: SessionId::new(),
            name: options.name,
            started_at: Utc::now(),
            clock: Instant::now(),
            project_dir: options.project_dir,
            reporter,
            ledger,
            classifier,
            state: Cell::new(SessionState::Running),
            _panic_scope: PanicScope::install(),
        };

        info!(session_id = %session.id.0, name = %session.name, "session started");
        if options.print_headers {
            session.print_headers();
        }
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn classifier(&self) -> &FaultClassifier {
        &self.classifier
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// A handle pools can use to raise runtime faults into this session.
    pub fn fault_reporter(&self) -> FaultReporter {
        FaultReporter::new(&self.classifier)
    }

    /// Hide notice-level faults from here on.
    pub fn mute_notices(&self) {
        self.classifier.set_mask(SeverityMask::WITHOUT_NOTICES);
    }

    /// Show every fault severity from here on.
    pub fn unmute_notices(&self) {
        self.classifier.set_mask(SeverityMask::FULL);
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            id: self.id.clone(),
            name: self.name.clone(),
            started_at: self.started_at,
            elapsed: self.clock.elapsed(),
            tally: self.ledger.tally(),
            state: self.state.get(),
            severity_mask: self.classifier.mask(),
        }
    }

    /// Print every event `pool` dispatches as a debug line.
    pub fn debug_events(&self, pool: &dyn CachePool) -> SubscriptionToken {
        pool.events().subscribe(
            EventFilter::Every,
            Arc::new(EventPrinter {
                reporter: self.reporter.clone(),
            }),
        )
    }

    /// Launch `<project_dir>/subprocess/<name>.subprocess` without waiting on it.
    pub fn run_subprocess(&self, name: &str) -> HarnessResult<u32> {
        let path = process::subprocess_path(&self.project_dir, name);
        self.reporter
            .debug(&format!("Running subprocess on \"{}\"", path.display()));
        process::run_async_process(&path, &[])
    }

    /// Launch an arbitrary program without waiting on it.
    pub fn run_async_process(&self, program: &str, args: &[String]) -> HarnessResult<u32> {
        self.reporter
            .debug(&format!("Running detached process \"{program}\""));
        process::run_async_process(program, args)
    }

    /// Run a verification body, then finish the session.
    ///
    /// An error or panic escaping `body` is classified and recorded, and the
    /// session moves straight to its footer.
    pub fn run<F>(self, body: F) -> SessionSummary
    where
        F: FnOnce(&Session) -> StepResult<()>,
    {
        let outcome = match catch_panic(|| body(&self)) {
            Ok(Ok(())) => None,
            Ok(Err(uncaught)) => Some(self.classifier.classify_error(&uncaught)),
            Err(caught) => Some(FaultClassifier::classify_panic(
                caught.payload.as_ref(),
                caught.location,
            )),
        };

        if let Some(outcome) = outcome {
            self.state.set(SessionState::Terminating);
            if outcome.is_skip() {
                info!(session_id = %self.id.0, ?outcome, "driver unavailable, ending session");
            } else {
                warn!(session_id = %self.id.0, ?outcome, "verification body aborted");
            }
            self.classifier.handle_uncaught(&outcome);
        }

        self.terminate()
    }

    /// Print the footer and compute the exit code.
    pub fn terminate(self) -> SessionSummary {
        self.state.set(SessionState::Terminating);

        let tally = self.ledger.tally();
        let duration = self.clock.elapsed();
        let peak_memory = peak_memory_bytes();
        let exit_code = derive_exit_code(tally.failed, tally.skipped, tally.passed);

        self.print_footer(&tally, duration, peak_memory);
        self.state.set(SessionState::Exited(exit_code));

        info!(
            session_id = %self.id.0,
            failed = tally.failed,
            skipped = tally.skipped,
            passed = tally.passed,
            exit_code,
            "session finished"
        );

        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            tally,
            duration,
            peak_memory,
            exit_code,
        }
    }

    fn print_headers(&self) {
        self.reporter.text(&format!(
            "[<blue>Begin Test:</blue> <magenta>{}</magenta>]",
            self.name
        ));
        self.reporter.text(&format!(
            "[<blue>POOLCHECK:</blue> CORE <yellow>v{}</yellow> | SESSION <yellow>{}</yellow>]",
            env!("CARGO_PKG_VERSION"),
            self.id.0
        ));
        self.reporter.text(&format!(
            "[<blue>RUNTIME</blue> <yellow>{}-{}</yellow> with pid <green>{}</green>]",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::process::id()
        ));
        self.reporter.text("---");
    }

    fn print_footer(&self, tally: &Tally, duration: Duration, peak_memory: Option<u64>) {
        let total = tally.total();
        let failed_color = if tally.failed > 0 { "red" } else { "green" };
        let skipped_color = if tally.skipped > 0 { "yellow" } else { "green" };
        let passed_color = if tally.passed == 0 && total > 0 { "red" } else { "green" };

        self.reporter.text(&format!(
            "<blue>Test results:</blue><{failed_color}> {} {} failed</{failed_color}>, <{skipped_color}>{} {} skipped</{skipped_color}> and <{passed_color}>{} {} passed</{passed_color}> out of a total of <cyan>{total}</cyan> {}.",
            tally.failed,
            assertions(tally.failed),
            tally.skipped,
            assertions(tally.skipped),
            tally.passed,
            assertions(tally.passed),
            assertions(total),
        ));
        self.reporter.text(&format!(
            "<blue>Test duration: </blue><yellow>{:.3}s</yellow>",
            duration.as_secs_f64()
        ));
        let memory = peak_memory.map_or_else(|| "n/a".to_string(), |b| readable_size(b, 1));
        self.reporter
            .text(&format!("<blue>Test memory: </blue><yellow>{memory}</yellow>"));
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

struct EventPrinter {
    reporter: Reporter,
}

impl PoolObserver for EventPrinter {
    fn notify(&self, event: &PoolEvent<'_>) {
        self.reporter
            .debug(&format!("Triggered event '{}'", event.kind()));
    }
}

fn assertions(n: u64) -> &'static str {
    if n == 1 {
        "assertion"
    } else {
        "assertions"
    }
}

/// Format a byte count as e.g. `12.3Mo`.
///
/// The unit is chosen from the number of decimal digits (three digits per
/// step) and the value is divided by the matching power of 1024.
pub fn readable_size(bytes: u64, decimals: usize) -> String {
    const UNITS: [&str; 6] = ["B", "K", "M", "G", "T", "P"];
    let digits = bytes.to_string().len();
    let factor = ((digits - 1) / 3).min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(factor as i32);
    format!("{value:.decimals$}{}o", UNITS[factor])
}

/// Peak resident memory of this process, in bytes.
///
/// Uses the kernel's high-water mark where available and falls back to the
/// current resident size reported by `sysinfo`.
pub fn peak_memory_bytes() -> Option<u64> {
    high_water_mark().or_else(resident_memory)
}

#[cfg(target_os = "linux")]
fn high_water_mark() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let kb = status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))?
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(kb * 1024)
}

#[cfg(not(target_os = "linux"))]
fn high_water_mark() -> Option<u64> {
    None
}

fn resident_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = sysinfo::System::new();
    sys.refresh_process(pid);
    let memory = sys.process(pid).map(|p| p.memory());
    debug!(?memory, "resident memory sampled via sysinfo");
    memory
}

#[cfg(test)]
mod tests {
    use poolcheck_contracts::{
        error::HarnessError,
        fault::Severity,
    };

    use super::*;
    use crate::report::BufferSink;

    fn start(name: &str) -> (Session, BufferSink) {
        let sink = BufferSink::new();
        let session = Session::start(
            SessionOptions::new(name).project_dir("/srv/project"),
            Arc::new(sink.clone()),
        );
        (session, sink)
    }

    #[test]
    fn headers_and_footer_are_printed() {
        let (session, sink) = start("headers");
        assert!(sink.contains("[<blue>Begin Test:</blue> <magenta>headers</magenta>]"));
        assert_eq!(session.state(), SessionState::Running);

        session.ledger().record_pass("one");
        let summary = session.terminate();

        assert_eq!(summary.exit_code, 0);
        assert!(sink.contains("<green>0 assertions failed</green>"));
        assert!(sink.contains("<green>1 assertion passed</green>"));
        assert!(sink.contains("out of a total of <cyan>1</cyan> assertion."));
        assert!(sink.contains("Test duration: "));
        assert!(sink.contains("Test memory: "));
    }

    #[test]
    fn clean_body_keeps_its_tally() {
        let (session, _) = start("clean");
        let summary = session.run(|s| {
            s.ledger().record_pass("a");
            s.ledger().record_skip("b");
            Ok(())
        });
        assert_eq!(summary.tally, Tally { failed: 0, passed: 1, skipped: 1 });
        assert_eq!(summary.exit_code, 0);
    }

    #[test]
    fn connect_failure_is_a_skip_and_ends_the_session() {
        let (session, sink) = start("connect");
        let mut reached_after = false;
        let summary = session.run(|s| {
            s.ledger().record_pass("before");
            Err::<(), _>(HarnessError::DriverConnect {
                driver: "Redis".into(),
                reason: "connection refused".into(),
            })?;
            reached_after = true;
            s.ledger().record_pass("after");
            Ok(())
        });

        assert!(!reached_after);
        assert_eq!(summary.tally, Tally { failed: 0, passed: 1, skipped: 1 });
        assert_eq!(summary.exit_code, 0);
        assert!(sink.contains("network/authentication issue"));
    }

    #[test]
    fn skip_only_session_exits_with_two() {
        let (session, _) = start("skip-only");
        let summary = session.run(|_| {
            Err::<(), _>(HarnessError::DriverCheck {
                driver: "Memcached".into(),
                reason: "extension not loaded".into(),
            })?;
            Ok(())
        });
        assert_eq!(summary.exit_code, 2);
        assert_eq!(summary.tally.skipped, 1);
    }

    #[test]
    fn other_errors_fail_the_session() {
        let (session, sink) = start("logic");
        let summary = session.run(|_| {
            Err::<(), _>(HarnessError::Logic { reason: String::new() })?;
            Ok(())
        });
        assert_eq!(summary.exit_code, 1);
        assert!(sink.contains("\"HarnessError::Logic\""));
        assert!(sink.contains("~/crates/poolcheck-core/src/session.rs"));
        assert!(sink.contains("\"[No message provided]\""));
    }

    #[test]
    fn panics_fail_the_session() {
        let (session, sink) = start("panic");
        let summary = session.run(|s| {
            s.ledger().record_pass("before");
            panic!("verification exploded");
        });
        assert_eq!(summary.tally, Tally { failed: 1, passed: 1, skipped: 0 });
        assert_eq!(summary.exit_code, 1);
        assert!(sink.contains("\"panic\""));
        assert!(sink.contains("verification exploded"));
    }

    #[test]
    fn fault_reporter_follows_the_mask_toggle() {
        let (session, sink) = start("mask");
        let faults = session.fault_reporter();

        session.mute_notices();
        assert_eq!(session.diagnostics().severity_mask, SeverityMask::WITHOUT_NOTICES);
        faults.notice("hidden notice");
        assert!(!sink.contains("hidden notice"));

        session.unmute_notices();
        faults.notice("visible notice");
        assert!(sink.contains("[NOTICE] visible notice"));

        faults.raise(Severity::Fatal, "fatal fault");
        let summary = session.terminate();
        assert_eq!(summary.tally.failed, 1);
        assert!(!faults.is_attached(), "reporter must detach when the session ends");
    }

    #[test]
    fn muted_session_option_starts_with_reduced_mask() {
        let sink = BufferSink::new();
        let session = Session::start(
            SessionOptions::new("muted").mute_notices(true).print_headers(false),
            Arc::new(sink.clone()),
        );
        assert_eq!(session.diagnostics().severity_mask, SeverityMask::WITHOUT_NOTICES);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn diagnostics_expose_session_internals() {
        let (session, _) = start("diag");
        session.ledger().record_fail("x", true);
        let diag = session.diagnostics();
        assert_eq!(diag.name, "diag");
        assert_eq!(diag.tally.failed, 1);
        assert_eq!(diag.state, SessionState::Running);
        assert!(diag.started_at <= Utc::now());
    }

    #[test]
    fn readable_sizes() {
        assert_eq!(readable_size(0, 1), "0.0Bo");
        assert_eq!(readable_size(999, 1), "999.0Bo");
        assert_eq!(readable_size(2048, 1), "2.0Ko");
        assert_eq!(readable_size(5 * 1024 * 1024, 2), "5.00Mo");
    }

    #[test]
    fn summary_serializes() {
        let (session, _) = start("json");
        let summary = session.terminate();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "json");
        assert_eq!(json["exit_code"], 0);
    }
}
