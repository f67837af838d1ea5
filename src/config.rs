use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the upstream CLI authenticates. Mirrors the three auth surfaces the
/// `gemini` CLI itself supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    GoogleLogin,
    ApiKey,
    VertexAi,
}

impl Default for AuthMethod {
    fn default() -> Self {
        AuthMethod::GoogleLogin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Markdown,
    Text,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Markdown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub per_minute: u32,
    pub per_day: u32,
    pub burst: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_minute: 60,
            per_day: 1000,
            burst: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
    pub max_entries: usize,
    pub directory: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 3_600_000,
            max_entries: 100,
            directory: ".claude-flow/cache/gemini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    pub default_type: crate::request::AnalysisType,
    pub output_format: OutputFormat,
    pub exclude_patterns: Vec<String>,
    pub max_file_size: Option<u64>,
    pub timeout_ms: u64,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            default_type: crate::request::AnalysisType::Codebase,
            output_format: OutputFormat::default(),
            exclude_patterns: Vec::new(),
            max_file_size: None,
            timeout_ms: 300_000,
        }
    }
}

/// Immutable within one request; mutated only through a persist-then-reload
/// cycle owned by the host (config persistence is out of scope here, see
/// `spec.md` §1). `GeminiConfig::from_json` is a convenience the host MAY use
/// to parse a config file it has already read off disk; this crate performs
/// no file I/O for configuration itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub enabled: bool,
    pub auth_method: AuthMethod,
    pub api_key: Option<String>,
    pub vertex_project: Option<String>,
    pub vertex_location: String,
    pub default_model: String,
    pub context_limit: u64,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub analysis: AnalysisDefaults,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auth_method: AuthMethod::default(),
            api_key: None,
            vertex_project: None,
            vertex_location: "us-central1".to_string(),
            default_model: "gemini-2.5-pro".to_string(),
            context_limit: 1_000_000,
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            analysis: AnalysisDefaults::default(),
        }
    }
}

impl GeminiConfig {
    /// Parses a configuration document the host has already loaded from
    /// disk. Missing fields fall back to spec defaults via `#[serde(default)]`.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|_| {
            ConfigError::MissingAuthField("config", "valid JSON matching GeminiConfig")
        })
    }

    /// Validates that the fields required by `auth_method` are present.
    /// Does not check filesystem/credential state — that is `StatusProbe`'s job.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Err(ConfigError::NotEnabled);
        }
        match self.auth_method {
            AuthMethod::ApiKey if self.api_key.is_none() => {
                Err(ConfigError::MissingAuthField("api-key", "apiKey"))
            }
            AuthMethod::VertexAi if self.vertex_project.is_none() => {
                Err(ConfigError::MissingAuthField("vertex-ai", "vertexProject"))
            }
            _ => Ok(()),
        }
    }
}
