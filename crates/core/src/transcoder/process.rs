//! Bounded-lifetime subprocess execution.

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use super::types::ExitOutcome;

/// Upper bound on stderr kept in memory per process.
const STDERR_CAPTURE_LIMIT: usize = 64 * 1024;

/// Spawns `command`, draining stdout and stderr while waiting for it.
///
/// When `limit` elapses the process is killed and reaped within
/// `kill_grace`. The child is also killed if this future is dropped.
pub async fn run_with_timeout(
    mut command: Command,
    limit: Duration,
    kill_grace: Duration,
) -> std::io::Result<ExitOutcome> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        let (status, (), stderr) = tokio::join!(
            child.wait(),
            discard(stdout),
            capture_tail(stderr, STDERR_CAPTURE_LIMIT)
        );
        status.map(|status| (status, stderr))
    };
    let result = tokio::time::timeout(limit, run).await;

    match result {
        Ok(Ok((status, stderr))) => Ok(ExitOutcome::Exited {
            code: status.code(),
            stderr,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!(?pid, limit_secs = limit.as_secs(), "Process exceeded time limit, killing");
            if let Err(e) = child.start_kill() {
                warn!(?pid, error = %e, "Failed to signal process");
            }
            match tokio::time::timeout(kill_grace, child.wait()).await {
                Ok(_) => debug!(?pid, "Killed process reaped"),
                Err(_) => warn!(
                    ?pid,
                    grace_secs = kill_grace.as_secs(),
                    "Killed process was not reaped within grace period"
                ),
            }
            Ok(ExitOutcome::TimedOut)
        }
    }
}

async fn discard(stdout: Option<ChildStdout>) {
    if let Some(mut stdout) = stdout {
        let _ = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await;
    }
}

/// Reads the stream to EOF, keeping only the last `limit` bytes.
async fn capture_tail(stderr: Option<ChildStderr>, limit: usize) -> Vec<u8> {
    let mut tail = Vec::new();
    let Some(mut stderr) = stderr else {
        return tail;
    };

    let mut buf = [0u8; 8192];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > limit {
                    let excess = tail.len() - limit;
                    tail.drain(..excess);
                }
            }
        }
    }
    tail
}
