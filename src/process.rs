//! C6 — Subprocess Runner: launches the upstream CLI, enforces a timeout,
//! collects stdout/stderr, and maps exit codes to outcomes. See spec §4.6.
//!
//! Structurally this mirrors `claude_code::process::run_command`, but adds
//! the hard-kill-on-timeout behavior the spec requires and that the
//! teacher's version does not attempt (it only lets the wait future time
//! out, leaving the child running).

use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time;
use tracing::{debug, warn};

use crate::error::ExecutionError;

/// Large enough to avoid truncation on verbose runs without holding an
/// unbounded amount of memory per invocation.
const MAX_BUFFERED_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

async fn read_capped<R>(mut reader: R) -> Result<Vec<u8>, std::io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if buffer.len() + n > MAX_BUFFERED_BYTES {
            warn!("subprocess output exceeded buffer cap, truncating");
            let remaining = MAX_BUFFERED_BYTES.saturating_sub(buffer.len());
            buffer.extend_from_slice(&chunk[..remaining.min(n)]);
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    Ok(buffer)
}

pub(crate) fn apply_env(command: &mut Command, env: &BTreeMap<String, String>) {
    for (k, v) in env {
        command.env(k, v);
    }
}

/// Runs `binary` with `args`, capturing stdout/stderr, enforcing `timeout`.
/// On timeout the child is killed before `ExecutionError::Timeout` is
/// returned — the spec requires the process not be left running.
#[tracing::instrument(skip(env), fields(binary = %binary.display()))]
pub async fn run(
    binary: &Path,
    args: &[String],
    env: &BTreeMap<String, String>,
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, ExecutionError> {
    let mut command = Command::new(binary);
    command.args(args);
    command.stdin(std::process::Stdio::null());
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }
    apply_env(&mut command, env);

    let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
        binary: binary.to_path_buf(),
        source,
    })?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let stdout_task = tokio::spawn(read_capped(stdout));
    let stderr_task = tokio::spawn(read_capped(stderr));

    let status = match time::timeout(timeout, child.wait()).await {
        Ok(result) => result.map_err(ExecutionError::Wait)?,
        Err(_) => {
            warn!(?timeout, "subprocess exceeded timeout, killing");
            // Best-effort: terminate, then reap to avoid a zombie process.
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(ExecutionError::Timeout { timeout });
        }
    };

    let stdout = stdout_task
        .await
        .map_err(|e| ExecutionError::Join(e.to_string()))?
        .map_err(ExecutionError::StdoutRead)?;
    let stderr = stderr_task
        .await
        .map_err(|e| ExecutionError::Join(e.to_string()))?
        .map_err(ExecutionError::StderrRead)?;

    debug!(?status, stdout_len = stdout.len(), stderr_len = stderr.len(), "subprocess exited");

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

/// Merges the parent environment with a per-invocation override map, per
/// spec §4.6/§9: the orchestrator never mutates the parent process's
/// environment for long-lived state, only the subprocess's.
pub fn merged_env(overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = std::env::vars().collect();
    for (k, v) in overrides {
        env.insert(k.clone(), v.clone());
    }
    env
}
