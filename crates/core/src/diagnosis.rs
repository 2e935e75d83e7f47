//! Diagnosis records produced by failure analysis.

use serde::{Deserialize, Serialize};

/// Category reported when nothing more specific can be determined.
pub const UNKNOWN_ERROR_TYPE: &str = "unknown";

/// One file-level fix suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestion {
    /// Path (or coarse location such as "CI workflow") the fix applies to.
    pub file: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl FixSuggestion {
    pub fn new(file: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            description: description.into(),
            code_change: None,
            diff: None,
            line_number: None,
        }
    }

    pub fn with_code_change(mut self, code_change: impl Into<String>) -> Self {
        self.code_change = Some(code_change.into());
        self
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = Some(diff.into());
        self
    }

    pub fn with_line_number(mut self, line_number: Option<u32>) -> Self {
        self.line_number = line_number;
        self
    }

    /// A suggestion is actionable when it says *something* to change.
    pub fn is_actionable(&self) -> bool {
        let non_empty = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        !self.description.trim().is_empty() || non_empty(&self.code_change) || non_empty(&self.diff)
    }
}

/// Structured result of analysing one error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub error_type: String,
    pub root_cause: String,
    #[serde(default)]
    pub fixes: Vec<FixSuggestion>,
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Always within \[0, 1\].
    pub confidence_score: f64,
    /// Plain-text explanation, kept as the markdown/plain fallback for clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Set when no structured agent output was usable and the rule-based
    /// classifier produced this diagnosis.
    #[serde(rename = "interpretationDegraded", default)]
    pub degraded: bool,
}

impl Diagnosis {
    /// The diagnosis of last resort: unknown category, zero confidence.
    pub fn unknown() -> Self {
        Self {
            error_type: UNKNOWN_ERROR_TYPE.to_string(),
            root_cause: "See error log for details".to_string(),
            fixes: Vec::new(),
            instructions: Vec::new(),
            confidence_score: 0.0,
            explanation: None,
            degraded: true,
        }
    }

    pub fn has_actionable_fix(&self) -> bool {
        self.fixes.iter().any(FixSuggestion::is_actionable)
    }
}

/// Pull request created from a completed job's fixes by an outside collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub pr_url: String,
    pub pr_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_suggestion_is_not_actionable() {
        let fix = FixSuggestion::new("src/lib.rs", "  ").with_code_change("");
        assert!(!fix.is_actionable());
    }

    #[test]
    fn diff_alone_is_actionable() {
        let fix = FixSuggestion::new("src/lib.rs", "").with_diff("-a\n+b");
        assert!(fix.is_actionable());
    }

    #[test]
    fn unknown_diagnosis_has_no_fix() {
        let d = Diagnosis::unknown();
        assert_eq!(d.error_type, UNKNOWN_ERROR_TYPE);
        assert_eq!(d.confidence_score, 0.0);
        assert!(!d.has_actionable_fix());
    }

    #[test]
    fn degraded_flag_uses_wire_name() {
        let json = serde_json::to_value(Diagnosis::unknown()).unwrap();
        assert_eq!(json["interpretationDegraded"], serde_json::json!(true));
        assert_eq!(json["errorType"], serde_json::json!("unknown"));
    }
}
