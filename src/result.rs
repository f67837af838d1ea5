use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Case-insensitively normalizes an upstream severity string, falling
    /// back to `Info` for anything unrecognized (spec §4.5 step 3).
    pub fn normalize(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub location: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Finding {
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            kind: "general".to_string(),
            severity: Severity::Info,
            location: "unknown".to_string(),
            message: message.into(),
            suggestion: None,
            line: None,
            column: None,
            code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: Priority,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub files_analyzed: u64,
    pub lines_of_code: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Every field is REQUIRED on every returned result, even on failure — the
/// hard contract from spec §3/§7. There is no "partial" variant: failure
/// paths populate the same struct with zeroed/empty fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub request_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub token_usage: TokenUsage,
    pub summary: String,
    pub findings: Vec<Finding>,
    pub metrics: Metrics,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl AnalysisResult {
    /// Builds the structured failure shape required verbatim by spec §7:
    /// `summary = "Analysis failed"`, empty findings/recommendations, zeroed
    /// token usage and metrics, `errors[0]` carrying the failure message.
    pub(crate) fn failure(request_id: String, duration_ms: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id,
            timestamp: chrono::Utc::now(),
            duration_ms,
            token_usage: TokenUsage::default(),
            summary: "Analysis failed".to_string(),
            findings: Vec::new(),
            metrics: Metrics::default(),
            recommendations: Vec::new(),
            raw_output: None,
            errors: Some(vec![message.into()]),
        }
    }
}
