#![forbid(unsafe_code)]
//! Programmatic analysis service built on top of the `gemini` CLI.
//!
//! Wraps subprocess lifecycle, rate limiting, and two-tier caching behind a
//! single entry point, [`GeminiBridge::analyze`]. Does not implement the
//! upstream CLI's own command surface, config persistence, OAuth flow,
//! module-registry/MCP integration, or event pretty-printing — those remain
//! the host's responsibility.

mod cache;
mod config;
mod error;
mod events;
mod locator;
mod orchestrator;
mod parser;
mod process;
mod prompt;
mod request;
mod result;
mod rate_limiter;
mod status;

pub use cache::{generate_key, Cache, CacheStats, InvalidatePattern};
pub use config::{AnalysisDefaults, AuthMethod, CacheConfig, GeminiConfig, OutputFormat, RateLimitConfig};
pub use error::{AuthError, CacheError, ConfigError, ExecutionError, InstallError, RateLimitError};
pub use events::{EventSink, GeminiBridgeEvent, GeminiBridgeEventContext, GeminiBridgeEventKind};
pub use locator::PlatformInfo;
pub use orchestrator::{GeminiBridge, VerifyResult};
pub use process::CommandOutput;
pub use rate_limiter::RateLimiter;
pub use request::{AnalysisRequest, AnalysisTarget, AnalysisType, Depth};
pub use result::{AnalysisResult, Finding, Metrics, Priority, Recommendation, Severity, TokenUsage};
pub use status::{ModuleStatus, QuotaStatus, WindowStatus};

use std::sync::OnceLock;
use tokio::sync::Mutex;

static GLOBAL: OnceLock<Mutex<Option<GeminiBridge>>> = OnceLock::new();

/// Process-wide singleton, for hosts that genuinely need one (module
/// registry integration) rather than threading a `GeminiBridge` through
/// explicitly. Constructs from `config` on first call; subsequent calls
/// ignore `config` and return the existing instance. Prefer
/// [`GeminiBridge::new`] wherever explicit construction is practical
/// (spec §9).
pub async fn global(config: impl FnOnce() -> GeminiConfig) -> tokio::sync::MappedMutexGuard<'static, GeminiBridge> {
    let lock = GLOBAL.get_or_init(|| Mutex::new(None));
    let mut guard = lock.lock().await;
    if guard.is_none() {
        *guard = Some(GeminiBridge::new(config()));
    }
    tokio::sync::MutexGuard::map(guard, |slot| slot.as_mut().expect("just initialized"))
}

/// Resets the process-wide singleton. Test-only escape hatch so suites don't
/// leak state across cases (spec §9: "expose an explicit reset-for-testing
/// hook").
pub async fn reset_global_for_testing() {
    if let Some(lock) = GLOBAL.get() {
        *lock.lock().await = None;
    }
}
