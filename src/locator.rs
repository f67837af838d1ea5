//! C1 — Binary Locator: resolves a path to the upstream `gemini` CLI,
//! memoized per-process the way `codex::capabilities::cache` memoizes
//! capability snapshots behind a `OnceLock<Mutex<_>>`.

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use tracing::debug;

const BINARY_NAME: &str = "gemini";

/// Overrides binary resolution entirely when set, the same way the teacher
/// lets `CLAUDE_BINARY`/`CODEX_BINARY` point at an explicit path instead of
/// searching `PATH`. Bypasses the memoized cache (re-read on every call) so
/// hosts — and tests — can point at a fixture binary without fighting
/// process-lifetime memoization.
const BINARY_OVERRIDE_ENV: &str = "GEMINI_BINARY";

fn binary_override() -> Option<PathBuf> {
    let value = std::env::var(BINARY_OVERRIDE_ENV).ok()?;
    if value.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

#[derive(Debug, Clone, Default)]
pub struct PlatformInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub shell: Option<String>,
    pub home_dir: Option<PathBuf>,
    pub global_package_dir: Option<PathBuf>,
}

fn locator_cache() -> &'static Mutex<Option<Option<PathBuf>>> {
    static CACHE: OnceLock<Mutex<Option<Option<PathBuf>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(None))
}

fn version_cache() -> &'static Mutex<Option<Option<String>>> {
    static CACHE: OnceLock<Mutex<Option<Option<String>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(None))
}

/// Resolves the `gemini` binary. Memoized; call [`clear_cache`] after an
/// install/uninstall operation performed by the host (out of scope here).
pub fn find_binary() -> Option<PathBuf> {
    if let Some(path) = binary_override() {
        return Some(path);
    }

    if let Ok(guard) = locator_cache().lock() {
        if let Some(cached) = guard.as_ref() {
            return cached.clone();
        }
    }

    let resolved = resolve_uncached();

    if let Ok(mut guard) = locator_cache().lock() {
        *guard = Some(resolved.clone());
    }

    resolved
}

/// Clears the memoized binary path and version, forcing the next
/// [`find_binary`]/[`get_version`] call to re-probe the filesystem.
pub fn clear_cache() {
    if let Ok(mut guard) = locator_cache().lock() {
        *guard = None;
    }
    if let Ok(mut guard) = version_cache().lock() {
        *guard = None;
    }
}

pub fn is_installed() -> bool {
    find_binary().is_some()
}

fn resolve_uncached() -> Option<PathBuf> {
    if let Some(path) = which_lookup() {
        debug!(?path, "resolved gemini binary via which/where");
        return Some(path);
    }

    for candidate in candidate_paths() {
        if is_executable_file(&candidate) {
            debug!(?candidate, "resolved gemini binary via candidate list");
            return Some(candidate);
        }
    }

    None
}

#[cfg(unix)]
fn which_lookup() -> Option<PathBuf> {
    run_lookup("which")
}

#[cfg(windows)]
fn which_lookup() -> Option<PathBuf> {
    run_lookup("where")
}

fn run_lookup(tool: &str) -> Option<PathBuf> {
    let output = StdCommand::new(tool).arg(BINARY_NAME).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next()?.trim();
    if first_line.is_empty() {
        return None;
    }
    let path = PathBuf::from(first_line);
    is_executable_file(&path).then_some(path)
}

#[cfg(unix)]
fn candidate_paths() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let mut candidates = Vec::new();
    if let Some(home) = &home {
        candidates.push(home.join(".local/bin").join(BINARY_NAME));
    }
    candidates.push(PathBuf::from("/usr/local/bin").join(BINARY_NAME));
    candidates.push(PathBuf::from("/usr/bin").join(BINARY_NAME));
    if let Some(home) = &home {
        candidates.push(home.join(".npm-global/bin").join(BINARY_NAME));
        candidates.push(home.join("n/bin").join(BINARY_NAME));
    }
    candidates
}

#[cfg(windows)]
fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(appdata) = std::env::var_os("APPDATA") {
        candidates.push(PathBuf::from(appdata).join("npm").join("gemini.cmd"));
    }
    if let Some(local) = std::env::var_os("LOCALAPPDATA") {
        candidates.push(PathBuf::from(local).join("npm").join("gemini.cmd"));
    }
    candidates.push(PathBuf::from(r"C:\Program Files\nodejs\gemini.cmd"));
    candidates
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(windows)]
fn is_executable_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

static VERSION_RE_PATTERN: &str = r"\d+\.\d+\.\d+";

/// Invokes `<binary> --version` with a short timeout and extracts the first
/// `MAJOR.MINOR.PATCH` match. Memoized like [`find_binary`].
pub fn get_version(binary: &Path) -> Option<String> {
    if let Ok(guard) = version_cache().lock() {
        if let Some(cached) = guard.as_ref() {
            return cached.clone();
        }
    }

    let version = probe_version(binary);

    if let Ok(mut guard) = version_cache().lock() {
        *guard = Some(version.clone());
    }

    version
}

fn probe_version(binary: &Path) -> Option<String> {
    let output = run_with_timeout(binary, &["--version"], Duration::from_secs(5))?;
    let re = regex::Regex::new(VERSION_RE_PATTERN).ok()?;
    let stdout = String::from_utf8_lossy(&output);
    re.find(&stdout).map(|m| m.as_str().to_string())
}

/// Runs `binary` on a detached thread and waits at most `timeout` for it to
/// finish, so a hung `--version` probe cannot block the caller forever. The
/// async `SubprocessRunner` (C6) additionally kills the child itself on
/// expiry, which matters for long-lived analysis invocations; a version
/// probe is short and rare enough that leaving it to finish in the
/// background (rather than threading a kill handle across the channel) is
/// an acceptable trade here.
fn run_with_timeout(binary: &Path, args: &[&str], timeout: Duration) -> Option<Vec<u8>> {
    let binary = binary.to_path_buf();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let _ = tx.send(StdCommand::new(&binary).args(&args).output());
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) if output.status.success() => Some(output.stdout),
        Ok(_) | Err(_) => None,
    }
}

/// Splits a version string into integer components, padding missing
/// components with zero, for lexicographic comparison per spec §4.1.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |s: &str| -> Vec<u64> { s.split('.').map(|p| p.parse().unwrap_or(0)).collect() };
    let mut av = parse(a);
    let mut bv = parse(b);
    while av.len() < bv.len() {
        av.push(0);
    }
    while bv.len() < av.len() {
        bv.push(0);
    }
    av.cmp(&bv)
}

pub fn get_platform_info() -> PlatformInfo {
    PlatformInfo {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        shell: std::env::var("SHELL").ok(),
        home_dir: dirs::home_dir(),
        global_package_dir: dirs::data_dir(),
    }
}
