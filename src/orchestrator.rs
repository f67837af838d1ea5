//! C7 — Orchestrator: composes cache → rate-limit wait → subprocess exec →
//! parse → cache write into the single public entry point, `analyze`. See
//! spec §4.7. `GeminiBridge` is the composition root, playing the role
//! `ClaudeClient` plays in the teacher crate.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cache::{generate_key, Cache};
use crate::config::{GeminiConfig, OutputFormat};
use crate::error::CacheError;
use crate::events::{EventSink, GeminiBridgeEvent, GeminiBridgeEventKind};
use crate::locator;
use crate::process;
use crate::prompt;
use crate::rate_limiter::RateLimiter;
use crate::request::{AnalysisRequest, AnalysisTarget, AnalysisType, Depth};
use crate::result::AnalysisResult;
use crate::status::{self, ModuleStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub implemented: bool,
    pub confidence: u8,
    pub details: String,
}

/// Owns the cache and rate limiter for one session. Construct explicitly
/// via [`GeminiBridge::new`]; reach for [`crate::global`] only when a host
/// genuinely needs a process-wide singleton (spec §9).
pub struct GeminiBridge {
    config: GeminiConfig,
    cache: Cache,
    rate_limiter: RateLimiter,
}

impl GeminiBridge {
    pub fn new(config: GeminiConfig) -> Self {
        let rate_limiter = RateLimiter::new(&config.rate_limit);
        let cache = Cache::new(config.cache.clone());
        Self {
            config,
            cache,
            rate_limiter,
        }
    }

    /// Creates the cache directory and reinstates unexpired shards. Must be
    /// called once before the first `analyze` (spec §9: "`initialize` MUST
    /// succeed on a fresh install").
    pub async fn initialize(&self) -> Result<(), CacheError> {
        self.cache.initialize().await
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub async fn status(&self) -> ModuleStatus {
        status::get_status(&self.config, &self.rate_limiter).await
    }

    /// The single entry point. Never returns `Err` — every failure mode
    /// folds into a structured `AnalysisResult` (spec §7's hard contract).
    #[tracing::instrument(skip(self, request, events), fields(kind = ?request.kind))]
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        events: Option<EventSink<'_>>,
    ) -> AnalysisResult {
        let request_id = generate_request_id();
        let start = Instant::now();
        emit(events, GeminiBridgeEventKind::AnalysisStart, &request_id, None);

        let key = generate_key(&request);

        if let Some(cached) = self.cache.get(&key).await {
            emit(
                events,
                GeminiBridgeEventKind::CacheHit,
                &request_id,
                Some(key),
            );
            return cached;
        }

        self.rate_limiter.wait_for_quota().await;

        let Some(binary) = locator::find_binary() else {
            let result = AnalysisResult::failure(
                request_id.clone(),
                elapsed_ms(start),
                "Gemini CLI not installed",
            );
            emit(events, GeminiBridgeEventKind::AnalysisComplete, &request_id, None);
            return result;
        };

        let args = build_args(&request, &self.config.analysis.output_format);
        let env = process::merged_env(&Default::default());
        let timeout = Duration::from_millis(self.config.analysis.timeout_ms);

        let output = match process::run(&binary, &args, &env, None, timeout).await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                let message =
                    crate::error::ExecutionError::from_exit(output.status, &output.stderr)
                        .to_string();
                let result = AnalysisResult::failure(request_id.clone(), elapsed_ms(start), message);
                emit(events, GeminiBridgeEventKind::AnalysisComplete, &request_id, None);
                return result;
            }
            Err(source) => {
                // No rate token is consumed on a failed run (spec §4.7 step 8).
                let result =
                    AnalysisResult::failure(request_id.clone(), elapsed_ms(start), source.to_string());
                emit(events, GeminiBridgeEventKind::AnalysisComplete, &request_id, None);
                return result;
            }
        };

        let _ = self.rate_limiter.consume().await;

        emit(events, GeminiBridgeEventKind::Output, &request_id, None);
        let parsed = crate::parser::parse(&output.stdout);
        let result = AnalysisResult {
            success: true,
            request_id: request_id.clone(),
            timestamp: chrono::Utc::now(),
            duration_ms: elapsed_ms(start),
            token_usage: parsed.token_usage,
            summary: parsed.summary,
            findings: parsed.findings,
            metrics: parsed.metrics,
            recommendations: parsed.recommendations,
            raw_output: Some(parsed.raw_output),
            errors: None,
        };

        self.cache.set(&key, result.clone()).await;
        emit(events, GeminiBridgeEventKind::AnalysisComplete, &request_id, None);
        result
    }

    pub async fn security_scan(&self, target: impl Into<AnalysisTarget>) -> AnalysisResult {
        let request = AnalysisRequest::new(AnalysisType::Security, target)
            .depth(Depth::Deep)
            .focus(["vulnerabilities", "secrets", "misconfig"]);
        self.analyze(request, None).await
    }

    pub async fn architecture_map(&self, target: impl Into<AnalysisTarget>) -> AnalysisResult {
        let request = AnalysisRequest::new(AnalysisType::Architecture, target)
            .depth(Depth::Comprehensive)
            .focus(["components", "dependencies", "layers"]);
        self.analyze(request, None).await
    }

    pub async fn dependency_analysis(&self, target: impl Into<AnalysisTarget>) -> AnalysisResult {
        let request = AnalysisRequest::new(AnalysisType::Dependencies, target)
            .depth(Depth::Deep)
            .focus(["outdated", "vulnerabilities", "licenses"]);
        self.analyze(request, None).await
    }

    pub async fn coverage_assess(&self, target: impl Into<AnalysisTarget>) -> AnalysisResult {
        let request = AnalysisRequest::new(AnalysisType::Coverage, target)
            .depth(Depth::Moderate)
            .focus(["untested", "quality", "edge-cases"]);
        self.analyze(request, None).await
    }

    /// Asks whether `feature` is implemented under `target` by requesting a
    /// JSON-shaped answer and parsing it back out. Falls back to
    /// `{false, 0, result.summary}` on parse failure (spec §4.7).
    pub async fn verify(&self, feature: &str, target: impl Into<AnalysisTarget>) -> VerifyResult {
        let query = format!(
            "Is the feature \"{feature}\" implemented in this codebase? \
             Respond with JSON containing fields: implemented (boolean), \
             confidence (0-100), details (string)."
        );
        let request = AnalysisRequest::new(AnalysisType::Codebase, target).query(query);
        let result = self.analyze(request, None).await;

        result
            .raw_output
            .as_deref()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .and_then(|value| {
                let implemented = value.get("implemented")?.as_bool()?;
                let confidence = value
                    .get("confidence")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0)
                    .min(100) as u8;
                let details = value
                    .get("details")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| result.summary.clone());
                Some(VerifyResult {
                    implemented,
                    confidence,
                    details,
                })
            })
            .unwrap_or(VerifyResult {
                implemented: false,
                confidence: 0,
                details: result.summary,
            })
    }
}

fn emit(
    events: Option<EventSink<'_>>,
    kind: GeminiBridgeEventKind,
    request_id: &str,
    detail: Option<String>,
) {
    if let Some(sink) = events {
        sink(GeminiBridgeEvent::new(kind, request_id, detail));
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// `gemini-<epoch-ms in hex>-<random 32 bits in hex>`, unique enough within
/// one process without pulling in a UUID dependency the teacher doesn't use.
fn generate_request_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen();
    format!("gemini-{millis:x}-{suffix:x}")
}

/// Path `@`-refs first, then `-p <prompt>`, then `--json` if requested
/// (spec §4.7 step 6). A request that omits `output_format` falls back to
/// `config.analysis.output_format` rather than silently defaulting to no
/// flag at all (spec §3).
fn build_args(request: &AnalysisRequest, default_output_format: &OutputFormat) -> Vec<String> {
    let mut args = prompt::path_args(request);
    args.push("-p".to_string());
    args.push(prompt::build(request));
    let output_format = request.output_format.as_ref().unwrap_or(default_output_format);
    if *output_format == OutputFormat::Json {
        args.push("--json".to_string());
    }
    args
}
