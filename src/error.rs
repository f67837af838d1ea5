use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::status::QuotaStatus;

/// The module is not enabled, or is missing configuration required for the
/// requested operation. Returned from non-analysis entry points only —
/// `analyze` never surfaces this, it folds configuration problems into a
/// failed `AnalysisResult` instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("gemini integration is not enabled")]
    NotEnabled,
    #[error("auth method `{0}` requires `{1}` to be set")]
    MissingAuthField(&'static str, &'static str),
}

/// Subprocess execution failed: spawn error, non-zero exit, or timeout.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("gemini binary not installed")]
    MissingBinary,
    #[error("failed to spawn gemini process (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("gemini process timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("failed waiting for gemini process: {0}")]
    Wait(#[source] std::io::Error),
    #[error("failed reading stdout: {0}")]
    StdoutRead(#[source] std::io::Error),
    #[error("failed reading stderr: {0}")]
    StderrRead(#[source] std::io::Error),
    #[error("failed writing stdin: {0}")]
    StdinWrite(#[source] std::io::Error),
    #[error("internal error: join failure: {0}")]
    Join(String),
    #[error("Command failed with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    #[error("Command terminated by signal: {stderr}")]
    Terminated { stderr: String },
}

impl ExecutionError {
    /// Renders the message the spec requires to land in `AnalysisResult.errors[0]`
    /// for a non-zero exit: `"Command failed with code N: <stderr>"`.
    pub(crate) fn from_exit(status: ExitStatus, stderr: &[u8]) -> Self {
        let stderr = String::from_utf8_lossy(stderr).into_owned();
        match status.code() {
            Some(code) => ExecutionError::NonZeroExit { code, stderr },
            None => ExecutionError::Terminated { stderr },
        }
    }
}

/// A rate-limiter bucket was empty when a direct `consume()` was attempted.
/// The orchestrator itself never observes this — it always waits via
/// `waitForQuota` — but callers that consume tokens directly may.
#[derive(Debug, Error)]
#[error("rate limit exceeded, retry after {retry_after:?}")]
pub struct RateLimitError {
    pub retry_after: Duration,
    pub quota: QuotaStatus,
}

/// Cache failure. Every cache operation except `initialize` logs-and-swallows
/// these per spec §4.3; `initialize` propagates a `CreateDir` failure since a
/// cache directory that cannot be created at all is a genuine setup problem
/// the host should see, not silently ignore.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory `{path}`: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read cache shard `{path}`: {source}")]
    ReadShard {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse cache shard `{path}`: {source}")]
    ParseShard {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write cache shard `{path}`: {source}")]
    WriteShard {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove cache shard `{path}`: {source}")]
    RemoveShard {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Raised by install/authenticate operations. These live outside the scope
/// of this crate's core (§1) but are defined here because status probes may
/// surface them indirectly.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credentials found for any configured auth method")]
    NoCredentials,
}

/// Raised by install/update operations (out of scope for analysis itself).
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("package manager invocation failed: {0}")]
    PackageManager(String),
}
