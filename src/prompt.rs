//! C4 — Prompt Builder: translates an `AnalysisRequest` into the textual
//! prompt string sent to the upstream CLI, plus the `@path` argv entries.
//! Pure function, no I/O — see spec §4.4.

use crate::request::{AnalysisRequest, AnalysisType, Depth};

fn base_prompt(kind: AnalysisType) -> &'static str {
    match kind {
        AnalysisType::Codebase => {
            "Analyze this codebase comprehensively. Identify patterns, structure, and key components."
        }
        AnalysisType::Architecture => {
            "Map the architecture of this codebase. Identify components, layers, dependencies, and data flows."
        }
        AnalysisType::Security => {
            "Perform a security audit. Find vulnerabilities, insecure patterns, hardcoded secrets, and misconfigurations."
        }
        AnalysisType::Dependencies => {
            "Analyze dependencies. Find outdated packages, vulnerabilities, license issues, and unused dependencies."
        }
        AnalysisType::Coverage => {
            "Assess test coverage. Identify untested code paths, missing edge cases, and testing recommendations."
        }
    }
}

fn depth_instruction(depth: Depth) -> &'static str {
    match depth {
        Depth::Surface => "Provide a quick overview without deep analysis.",
        Depth::Moderate => "Provide moderate detail with key findings.",
        Depth::Deep => "Provide detailed analysis with comprehensive findings.",
        Depth::Comprehensive => "Provide exhaustive analysis covering all aspects.",
    }
}

const CLOSING_INSTRUCTION: &str = "Return structured output with: summary, findings (type, severity, location, message, suggestion), metrics, and recommendations.";

/// Builds the prompt text. Path arguments are emitted separately via
/// [`path_args`] — they are never folded into the prompt string itself.
pub fn build(request: &AnalysisRequest) -> String {
    let mut prompt = String::from(base_prompt(request.kind));

    if let Some(query) = request.query.as_ref().filter(|q| !q.is_empty()) {
        prompt.push_str("\n\nAdditional focus: ");
        prompt.push_str(query);
    }

    if !request.focus.is_empty() {
        prompt.push_str("\n\nFocus on: ");
        prompt.push_str(&request.focus.join(", "));
    }

    prompt.push('\n');
    prompt.push('\n');
    prompt.push_str(depth_instruction(request.resolved_depth()));

    prompt.push('\n');
    prompt.push('\n');
    prompt.push_str(CLOSING_INSTRUCTION);

    prompt
}

/// Produces the `@path` CLI argv entries for every target path, in order.
pub fn path_args(request: &AnalysisRequest) -> Vec<String> {
    request
        .target
        .paths()
        .iter()
        .map(|p| format!("@{p}"))
        .collect()
}
