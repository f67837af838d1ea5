use serde::{Deserialize, Serialize};

use crate::config::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Codebase,
    Architecture,
    Security,
    Dependencies,
    Coverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Surface,
    Moderate,
    Deep,
    Comprehensive,
}

impl Default for Depth {
    fn default() -> Self {
        Depth::Moderate
    }
}

/// `target: string | ordered-sequence-of string` from the spec's data model.
/// Deserializes from either a bare JSON string or a JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisTarget {
    Single(String),
    Many(Vec<String>),
}

impl AnalysisTarget {
    pub fn single(path: impl Into<String>) -> Self {
        AnalysisTarget::Single(path.into())
    }

    pub fn paths(&self) -> &[String] {
        match self {
            AnalysisTarget::Single(s) => std::slice::from_ref(s),
            AnalysisTarget::Many(v) => v.as_slice(),
        }
    }
}

impl From<&str> for AnalysisTarget {
    fn from(value: &str) -> Self {
        AnalysisTarget::Single(value.to_string())
    }
}

impl From<Vec<String>> for AnalysisTarget {
    fn from(value: Vec<String>) -> Self {
        AnalysisTarget::Many(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(rename = "type")]
    pub kind: AnalysisType,
    pub target: AnalysisTarget,
    #[serde(default)]
    pub depth: Option<Depth>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub focus: Vec<String>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(kind: AnalysisType, target: impl Into<AnalysisTarget>) -> Self {
        Self {
            kind,
            target: target.into(),
            depth: None,
            query: None,
            focus: Vec::new(),
            output_format: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn focus(mut self, focus: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.focus = focus.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn resolved_depth(&self) -> Depth {
        self.depth.unwrap_or_default()
    }

    /// Validates `include_patterns`/`exclude_patterns` compile as globs.
    /// The core never walks the filesystem itself (the upstream CLI does
    /// that) — this only catches malformed patterns early, the way a
    /// well-behaved client validates its own request before shelling out.
    pub fn validate_patterns(&self) -> Result<(), glob::PatternError> {
        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            glob::Pattern::new(pattern)?;
        }
        Ok(())
    }
}
