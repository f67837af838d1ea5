//! C5 — Output Parser: parses upstream CLI stdout into a structured
//! `AnalysisResult`, preferring JSON and falling back to regex heuristics.
//! See spec §4.5.

use fallback_regexes::finding_regexes;
use fallback_regexes::recommendation_regexes;
use serde_json::Value;

use crate::result::{Finding, Metrics, Priority, Recommendation, Severity, TokenUsage};

/// Intermediate, not-yet-timestamped parse result. The orchestrator (C7)
/// stamps `request_id`/`timestamp`/`duration_ms`/`success` around this.
pub struct ParsedOutput {
    pub summary: String,
    pub findings: Vec<Finding>,
    pub metrics: Metrics,
    pub recommendations: Vec<Recommendation>,
    pub token_usage: TokenUsage,
    pub raw_output: String,
}

pub fn parse(stdout: &[u8]) -> ParsedOutput {
    let raw_output = String::from_utf8_lossy(stdout).into_owned();

    match serde_json::from_slice::<Value>(stdout) {
        Ok(value) if value.is_object() => parse_json(&value, raw_output),
        _ => parse_fallback(&raw_output),
    }
}

fn parse_json(value: &Value, raw_output: String) -> ParsedOutput {
    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("Analysis complete")
        .to_string();

    let findings = value
        .get("findings")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(normalize_finding).collect())
        .unwrap_or_default();

    let recommendations = value
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(normalize_recommendation).collect())
        .unwrap_or_default();

    let metrics = value
        .get("metrics")
        .map(normalize_metrics)
        .unwrap_or_default();

    let token_usage = value
        .get("tokenUsage")
        .map(normalize_token_usage)
        .unwrap_or_default();

    ParsedOutput {
        summary,
        findings,
        metrics,
        recommendations,
        token_usage,
        raw_output,
    }
}

fn normalize_finding(value: &Value) -> Finding {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("general")
        .to_string();

    let severity = value
        .get("severity")
        .and_then(Value::as_str)
        .map(Severity::normalize)
        .unwrap_or(Severity::Info);

    let location = value
        .get("location")
        .or_else(|| value.get("file"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let message = value
        .get("message")
        .or_else(|| value.get("description"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let suggestion = value
        .get("suggestion")
        .or_else(|| value.get("recommendation"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let line = value.get("line").and_then(Value::as_u64).map(|v| v as u32);
    let column = value
        .get("column")
        .and_then(Value::as_u64)
        .map(|v| v as u32);
    let code = value
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);

    Finding {
        kind,
        severity,
        location,
        message,
        suggestion,
        line,
        column,
        code,
    }
}

fn normalize_recommendation(value: &Value) -> Option<Recommendation> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("general")
        .to_string();
    let priority = value
        .get("priority")
        .and_then(Value::as_str)
        .map(parse_priority)
        .unwrap_or(Priority::Medium);
    let description = value
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Some(Recommendation {
        kind,
        priority,
        description,
    })
}

fn parse_priority(raw: &str) -> Priority {
    match raw.to_ascii_lowercase().as_str() {
        "high" => Priority::High,
        "low" => Priority::Low,
        _ => Priority::Medium,
    }
}

fn normalize_metrics(value: &Value) -> Metrics {
    Metrics {
        files_analyzed: value
            .get("filesAnalyzed")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        lines_of_code: value
            .get("linesOfCode")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        analysis_type: value
            .get("analysisType")
            .and_then(Value::as_str)
            .map(str::to_string),
        model: value
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn normalize_token_usage(value: &Value) -> TokenUsage {
    TokenUsage {
        prompt: value.get("prompt").and_then(Value::as_u64).unwrap_or(0),
        completion: value.get("completion").and_then(Value::as_u64).unwrap_or(0),
        total: value.get("total").and_then(Value::as_u64).unwrap_or(0),
    }
}

/// Regex-based heuristic extraction used when stdout is not valid JSON.
/// Deliberately preserves the double-counting quirk noted in spec §9: a
/// line matching more than one pattern family yields more than one finding.
/// Flagged there as an open question, not a bug to silently fix here.
fn parse_fallback(raw_output: &str) -> ParsedOutput {
    let summary = raw_output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(5)
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(500)
        .collect();

    let mut findings = Vec::new();
    for regex in finding_regexes() {
        for caps in regex.captures_iter(raw_output) {
            if let Some(message) = caps.get(2) {
                findings.push(Finding::general(message.as_str().trim().to_string()));
            }
        }
    }

    let mut recommendations = Vec::new();
    for regex in recommendation_regexes() {
        for caps in regex.captures_iter(raw_output) {
            if let Some(description) = caps.get(2) {
                recommendations.push(Recommendation {
                    kind: "general".to_string(),
                    priority: Priority::Medium,
                    description: description.as_str().trim().to_string(),
                });
            }
        }
    }

    ParsedOutput {
        summary,
        findings,
        metrics: Metrics::default(),
        recommendations,
        token_usage: TokenUsage::default(),
        raw_output: raw_output.to_string(),
    }
}

/// Statically-compiled regex families for the fallback path. Kept in a
/// dedicated sub-module so `parser.rs` itself reads top-to-bottom as JSON
/// path, then fallback path, matching spec §4.5's own ordering.
mod fallback_regexes {
    use regex::Regex;
    use std::sync::OnceLock;

    pub(super) fn finding_regexes() -> &'static [Regex] {
        static RE: OnceLock<Vec<Regex>> = OnceLock::new();
        RE.get_or_init(|| {
            vec![
                Regex::new(r"(?i)(error|warning|issue|vulnerability|problem):\s*(.+)").unwrap(),
                Regex::new(r"(?i)\b(found|detected|identified)\b\s*:?\s*(.+)").unwrap(),
            ]
        })
    }

    pub(super) fn recommendation_regexes() -> &'static [Regex] {
        static RE: OnceLock<Vec<Regex>> = OnceLock::new();
        RE.get_or_init(|| {
            vec![
                Regex::new(r"(?i)(recommend|suggest|should|consider):\s*(.+)").unwrap(),
                Regex::new(r"(?i)(recommendation|suggestion):\s*(.+)").unwrap(),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Severity;

    const S1_STDOUT: &str = r#"{"summary":"ok","findings":[{"type":"quality","severity":"HIGH","location":"a.ts:10","message":"foo"}],"metrics":{"filesAnalyzed":3,"linesOfCode":42},"recommendations":[{"type":"x","priority":"low","description":"d"}],"tokenUsage":{"prompt":100,"completion":50,"total":150}}"#;

    #[test]
    fn json_happy_path() {
        let parsed = parse(S1_STDOUT.as_bytes());
        assert_eq!(parsed.summary, "ok");
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].severity, Severity::High);
        assert_eq!(parsed.metrics.lines_of_code, 42);
        assert_eq!(parsed.token_usage.total, 150);
        assert_eq!(parsed.raw_output, S1_STDOUT);
    }

    const S2_STDOUT: &str = "Found potential SQL injection in db.ts\n\
We recommend: parameterize all queries\n\
Vulnerability: hardcoded secret at config.ts line 8\n";

    #[test]
    fn fallback_parse_extracts_findings_and_recommendations() {
        let parsed = parse(S2_STDOUT.as_bytes());
        assert!(parsed.findings.len() >= 2);
        assert!(parsed
            .findings
            .iter()
            .any(|f| f.message.contains("SQL injection in db.ts")));
        assert!(parsed
            .findings
            .iter()
            .any(|f| f.message.contains("hardcoded secret at config.ts line 8")));
        assert!(parsed.findings.iter().all(|f| f.severity == Severity::Info));
        assert!(parsed.findings.iter().all(|f| f.location == "unknown"));
        assert_eq!(parsed.recommendations.len(), 1);
        assert_eq!(parsed.recommendations[0].description, "parameterize all queries");
    }

    #[test]
    fn fallback_double_counts_a_line_matching_two_families() {
        // "Warning: Found: something bad" matches the error/warning family
        // starting at "Warning:" (capturing the rest of the line, including
        // "Found: something bad"), AND independently matches the
        // found/detected/identified family starting at "Found:". Both
        // regexes run over the full text, so this single logical line
        // produces two findings — the quirk flagged in spec §9, preserved
        // rather than deduplicated.
        let stdout = "Warning: Found: something bad\n";
        let parsed = parse(stdout.as_bytes());
        assert_eq!(parsed.findings.len(), 2);
    }

    #[test]
    fn severity_normalization() {
        assert_eq!(Severity::normalize("SUPER-CRITICAL"), Severity::Info);
        assert_eq!(Severity::normalize("Critical"), Severity::Critical);
        assert_eq!(Severity::normalize(""), Severity::Info);
    }

    #[test]
    fn finding_alias_resolution() {
        let value: Value = serde_json::from_str(
            r#"{"file":"b.ts","description":"desc","recommendation":"fix it"}"#,
        )
        .unwrap();
        let finding = normalize_finding(&value);
        assert_eq!(finding.location, "b.ts");
        assert_eq!(finding.message, "desc");
        assert_eq!(finding.suggestion.as_deref(), Some("fix it"));
        assert_eq!(finding.kind, "general");
        assert_eq!(finding.severity, Severity::Info);
    }
}
