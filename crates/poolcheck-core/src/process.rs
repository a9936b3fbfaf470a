//! Fire-and-forget process launch for out-of-band scenarios.
//!
//! The child is spawned with null stdio and reaped on a background thread;
//! nothing it does is observed by the harness.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{debug, warn};

use poolcheck_contracts::error::{HarnessError, HarnessResult};

/// Spawn `program` with `args` in the background. Returns the child's pid.
pub fn run_async_process(program: impl AsRef<Path>, args: &[String]) -> HarnessResult<u32> {
    let program = program.as_ref();
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| HarnessError::Io {
            reason: format!("failed to spawn '{}': {e}", program.display()),
        })?;

    let pid = child.id();
    debug!(program = %program.display(), pid, "detached subprocess started");
    reap(child);
    Ok(pid)
}

/// Wait on `child` from a background thread so it never lingers as a zombie.
fn reap(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => debug!(pid, %status, "detached subprocess exited"),
            Err(e) => warn!(pid, error = %e, "failed to wait on detached subprocess"),
        });
    if let Err(e) = spawned {
        warn!(pid, error = %e, "could not start reaper thread; subprocess left unreaped");
    }
}

/// Location of a named out-of-band script: `<root>/subprocess/<name>.subprocess`.
pub fn subprocess_path(root: &Path, name: &str) -> PathBuf {
    root.join("subprocess").join(format!("{name}.subprocess"))
}
