//! poolcheck: cache pool conformance runner
//!
//! Opens every pool listed in a fixture file and drives it through the
//! verification sequences, then exits with the session's exit code
//! (0 pass, 1 failure, 2 skip-only).
//!
//! Usage:
//!   cargo run -p poolcheck-cli -- run
//!   cargo run -p poolcheck-cli -- --config fixtures/memory.toml crud
//!   cargo run -p poolcheck-cli -- --mute-notices --no-color get-all-items

mod drivers;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use poolcheck_config::HarnessConfig;
use poolcheck_contracts::error::{HarnessResult, StepResult};
use poolcheck_core::{Session, SessionOptions};
use poolcheck_verify::ContractVerifier;

use crate::render::TerminalSink;

// ── CLI definition ────────────────────────────────────────────────────────────

/// poolcheck: conformance harness for PSR-6 style cache pools.
#[derive(Parser)]
#[command(
    name = "poolcheck",
    version,
    about = "Cache pool conformance harness",
    long_about = "Drives cache pools through CRUD, tag-strategy, deferred-write and\n\
                  bulk-retrieval checks, and exits with 0 (pass), 1 (failure) or 2 (skip-only)."
)]
struct Cli {
    /// Fixture file describing the session and the pools to verify.
    /// Without it a single default `memory` pool is verified.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hide notice-level runtime faults.
    #[arg(long, global = true)]
    mute_notices: bool,

    /// Strip color markup instead of rendering it.
    #[arg(long, global = true)]
    no_color: bool,

    /// Print every event the pools dispatch.
    #[arg(long, global = true)]
    debug_events: bool,

    /// Launch a program in the background before verifying (repeatable).
    #[arg(long = "spawn", value_name = "PROGRAM", global = true)]
    spawn: Vec<String>,

    /// Launch `subprocess/<NAME>.subprocess` from the working directory (repeatable).
    #[arg(long = "subprocess", value_name = "NAME", global = true)]
    subprocesses: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the CRUD and bulk-retrieval sequences on every pool.
    Run,
    /// Run only the CRUD sequence.
    Crud,
    /// Run only the bulk-retrieval sequence.
    GetAllItems,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging. Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let fixture = match load_fixture(&cli) {
        Ok(fixture) => fixture,
        Err(e) => {
            error!(error = %e, "fixture could not be loaded");
            eprintln!("poolcheck: {e}");
            std::process::exit(1);
        }
    };

    let options = SessionOptions::new(fixture.session.name.clone())
        .mute_notices(cli.mute_notices || fixture.session.mute_notices);
    let session = Session::start(options, Arc::new(TerminalSink::new(!cli.no_color)));

    let summary = session.run(|s| verify(s, &cli, &fixture));
    info!(exit_code = summary.exit_code, "poolcheck finished");
    std::process::exit(summary.exit_code);
}

fn load_fixture(cli: &Cli) -> HarnessResult<HarnessConfig> {
    let fixture = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::for_driver("memory"),
    };
    Ok(fixture.pre_configure())
}

// ── Verification body ─────────────────────────────────────────────────────────

fn verify(session: &Session, cli: &Cli, fixture: &HarnessConfig) -> StepResult<()> {
    for program in &cli.spawn {
        let pid = session.run_async_process(program, &[])?;
        session
            .reporter()
            .debug(&format!("Detached process \"{program}\" started with pid {pid}"));
    }
    for name in &cli.subprocesses {
        session.run_subprocess(name)?;
    }

    let verifier = ContractVerifier::new(session);
    for pool_fixture in &fixture.pools {
        let pool = drivers::open(pool_fixture, session.fault_reporter())?;
        if cli.debug_events {
            session.debug_events(pool.as_ref());
        }

        if matches!(cli.command, Command::Run | Command::Crud) {
            verifier.run_crud(pool.as_ref(), pool_fixture.clear)?;
        }
        if matches!(cli.command, Command::Run | Command::GetAllItems) {
            verifier.run_get_all_items(pool.as_ref())?;
        }
    }
    Ok(())
}
