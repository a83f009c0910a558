//! Supervised execution of the wrapped command.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::signal::unix::{SignalKind, signal};
use tracewrap_core::Error;
use tracewrap_trace::TRACEPARENT_VAR;
use tracing::{debug, warn};

/// Exit code reported when the child could not be started at all.
pub const LAUNCH_FAILED_EXIT_CODE: i32 = -1;

/// Outcome of a supervised child run.
///
/// `exit_code` mirrors the child's real exit code, or the launch-failure
/// sentinel. `error` carries the diagnostic cause when the run was not a
/// clean success.
#[derive(Debug)]
pub struct ExecResult {
    pub exit_code: i32,
    pub error: Option<Error>,
}

impl ExecResult {
    fn from_exit_code(exit_code: i32) -> Self {
        let error = (exit_code != 0).then_some(Error::NonZeroExit(exit_code));
        Self { exit_code, error }
    }

    fn launch_failure(program: &str, source: std::io::Error) -> Self {
        Self {
            exit_code: LAUNCH_FAILED_EXIT_CODE,
            error: Some(Error::Launch {
                program: program.to_string(),
                source,
            }),
        }
    }
}

/// Launch the command and supervise it to completion.
///
/// The child inherits the wrapper's stdin/stdout/stderr unmodified. Its
/// environment is the parent's with any existing propagation header
/// replaced by the freshly generated one; everything else passes through
/// untouched.
pub async fn launch(program: &str, args: &[String], traceparent: &str) -> ExecResult {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .env_remove(TRACEPARENT_VAR)
        .env(TRACEPARENT_VAR, traceparent);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return ExecResult::launch_failure(program, err),
    };
    debug!(program, pid = child.id(), "launched child process");

    match supervise(&mut child).await {
        Ok(status) => ExecResult::from_exit_code(status.code().unwrap_or(LAUNCH_FAILED_EXIT_CODE)),
        Err(err) => ExecResult::launch_failure(program, err),
    }
}

/// Wait for the child while listening for SIGINT/SIGTERM.
///
/// The first signal received is forwarded to the child, once; the wrapper
/// itself keeps waiting so the child can shut down gracefully and report
/// its own exit code.
async fn supervise(child: &mut Child) -> std::io::Result<ExitStatus> {
    let interrupt = signal(SignalKind::interrupt());
    let terminate = signal(SignalKind::terminate());
    let (Ok(mut interrupt), Ok(mut terminate)) = (interrupt, terminate) else {
        warn!("could not install signal handlers; signals will not reach the child");
        return child.wait().await;
    };

    let pid = child.id();
    let mut relayed = false;
    loop {
        tokio::select! {
            status = child.wait() => return status,
            _ = interrupt.recv(), if !relayed => {
                relay(pid, libc::SIGINT);
                relayed = true;
            }
            _ = terminate.recv(), if !relayed => {
                relay(pid, libc::SIGTERM);
                relayed = true;
            }
        }
    }
}

/// Best-effort signal forwarding; a no-op once the child has exited.
fn relay(pid: Option<u32>, signo: i32) {
    let Some(pid) = pid else { return };
    debug!(pid, signo, "relaying signal to child");
    let _ = unsafe { libc::kill(pid as libc::pid_t, signo) };
}

/// Best-effort `$PATH` resolution of the command, used for span attributes
/// only. A missing path is not an error.
pub fn lookup_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
