//! C8 — Status Probe: composes installed/authenticated/version/quota into a
//! snapshot for the host.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{AuthMethod, GeminiConfig};
use crate::locator;
use crate::rate_limiter::RateLimiter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowStatus {
    pub used: u64,
    pub limit: u64,
    pub reset_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub per_minute: WindowStatus,
    pub per_day: WindowStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub installed: bool,
    pub enabled: bool,
    pub authenticated: bool,
    pub version: Option<String>,
    pub auth_method: Option<AuthMethod>,
    pub binary_path: Option<PathBuf>,
    pub quota_status: QuotaStatus,
    pub last_check: chrono::DateTime<chrono::Utc>,
}

const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
const GOOGLE_APPLICATION_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Checks env vars, in order, then the credentials file. First hit wins.
fn detect_auth_method() -> Option<AuthMethod> {
    if std::env::var(GEMINI_API_KEY_ENV).is_ok_and(|v| !v.trim().is_empty()) {
        return Some(AuthMethod::ApiKey);
    }
    if std::env::var(GOOGLE_APPLICATION_CREDENTIALS_ENV).is_ok_and(|v| !v.trim().is_empty()) {
        return Some(AuthMethod::VertexAi);
    }
    if credentials_file_exists() {
        return Some(AuthMethod::GoogleLogin);
    }
    None
}

fn credentials_file_exists() -> bool {
    dirs::home_dir()
        .map(|home| home.join(".gemini").join("credentials.json"))
        .map(|path| path.is_file())
        .unwrap_or(false)
}

/// Composes `getStatus()` per spec §4.8.
pub async fn get_status(config: &GeminiConfig, rate_limiter: &RateLimiter) -> ModuleStatus {
    let binary = locator::find_binary();
    let version = binary.as_deref().and_then(locator::get_version);
    let auth_method = detect_auth_method();

    ModuleStatus {
        installed: binary.is_some(),
        enabled: config.enabled,
        authenticated: auth_method.is_some() || credentials_file_exists(),
        version,
        auth_method,
        binary_path: binary,
        quota_status: rate_limiter.get_quota_status().await,
        last_check: chrono::Utc::now(),
    }
}
