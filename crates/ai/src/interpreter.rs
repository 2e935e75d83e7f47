//! Interpretation of raw agent output.
//!
//! Two tiers:
//! 1. best-effort structured extraction: the span from the first `{` to the
//!    last `}` is parsed as JSON and its fields adopted;
//! 2. otherwise the rule-based classifier runs over the original error text.
//!    Any prose the agent did return is kept as the explanation, and a
//!    `Root cause:` line or a numbered/bulleted list in it overrides the
//!    canned root cause and instructions. The classifier still picks the
//!    category and the fixes.
//!
//! [`ResponseInterpreter::interpret`] is total: every input yields a
//! well-formed [`Diagnosis`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use cifixer_core::{Diagnosis, FixSuggestion, STORED_LOG_LENGTH, UNKNOWN_ERROR_TYPE, truncate_chars};

use crate::classifier::classify;

const DEFAULT_ROOT_CAUSE: &str = "See error log for details";

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseInterpreter;

impl ResponseInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Turn `raw_output` into a diagnosis for the failure described by `error_text`.
    pub fn interpret(&self, raw_output: &str, error_text: &str) -> Diagnosis {
        match extract_structured(raw_output) {
            Some(JsonValue::Object(fields)) => from_fields(&fields),
            _ => {
                let mut diagnosis = classify(error_text).remediation(error_text);
                adopt_prose(&mut diagnosis, raw_output);
                diagnosis
            }
        }
    }
}

static ROOT_CAUSE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)root cause[:\s]+([^\n]+)").expect("static regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\.|[-*])\s*(.+)$").expect("static regex"));

/// Fold unstructured agent text into a classifier diagnosis.
fn adopt_prose(diagnosis: &mut Diagnosis, raw_output: &str) {
    let prose = raw_output.trim();
    if prose.is_empty() {
        return;
    }

    if let Some(cause) = ROOT_CAUSE_LINE
        .captures(prose)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|c| !c.is_empty())
    {
        diagnosis.root_cause = cause.to_string();
    }

    let steps: Vec<String> = prose
        .lines()
        .filter_map(|line| LIST_ITEM.captures(line.trim()))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|step| !step.is_empty())
        .collect();
    if !steps.is_empty() {
        diagnosis.instructions = steps;
    }

    diagnosis.explanation = Some(truncate_chars(prose, STORED_LOG_LENGTH).to_string());
}

/// Parse the text between the first `{` and the last `}` as JSON.
pub fn extract_structured(raw_output: &str) -> Option<JsonValue> {
    let start = raw_output.find('{')?;
    let end = raw_output.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw_output[start..=end]).ok()
}

fn first<'a>(fields: &'a Map<String, JsonValue>, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter().find_map(|k| fields.get(*k)).filter(|v| !v.is_null())
}

fn text<'a>(fields: &'a Map<String, JsonValue>, keys: &[&str]) -> Option<&'a str> {
    first(fields, keys)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn owned_text(fields: &Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    text(fields, keys).map(str::to_string)
}

fn confidence(fields: &Map<String, JsonValue>) -> f64 {
    let value = match first(fields, &["confidenceScore", "confidence_score", "confidence"]) {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn line_number(fields: &Map<String, JsonValue>) -> Option<u32> {
    first(fields, &["line_number", "lineNumber", "line"])
        .and_then(JsonValue::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

/// `fixes` / `suggested_fixes` entries: `{file, description, code_change, line_number}`.
fn fix_entry(value: &JsonValue) -> Option<FixSuggestion> {
    let fields = value.as_object()?;
    let file = text(fields, &["file", "path"]).unwrap_or(UNKNOWN_ERROR_TYPE);
    let description = text(fields, &["description"]).unwrap_or_default();
    let mut fix = FixSuggestion::new(file, description).with_line_number(line_number(fields));
    if let Some(change) = owned_text(fields, &["code_change", "codeChange", "fixed_code", "content"]) {
        fix = fix.with_code_change(change);
    }
    if let Some(diff) = owned_text(fields, &["diff"]) {
        fix = fix.with_diff(diff);
    }
    Some(fix)
}

fn entries<'a>(value: Option<&'a JsonValue>) -> impl Iterator<Item = &'a JsonValue> {
    value.and_then(JsonValue::as_array).into_iter().flatten()
}

fn from_fields(fields: &Map<String, JsonValue>) -> Diagnosis {
    // `suggestedFix: {explanation, files: [{path, content, diff}]}`
    let suggested = first(fields, &["suggestedFix", "suggested_fix"]).and_then(JsonValue::as_object);

    let mut fixes: Vec<FixSuggestion> = entries(first(fields, &["fixes", "suggested_fixes", "suggestedFixes"]))
        .filter_map(fix_entry)
        .collect();
    if let Some(suggested) = suggested {
        fixes.extend(entries(suggested.get("files")).filter_map(fix_entry));
    }

    let explanation = suggested
        .and_then(|s| owned_text(s, &["explanation"]))
        .or_else(|| owned_text(fields, &["explanation", "fixSuggestion"]));

    let root_cause = owned_text(fields, &["rootCause", "root_cause"])
        .or_else(|| explanation.clone())
        .unwrap_or_else(|| DEFAULT_ROOT_CAUSE.to_string());

    let instructions = entries(first(fields, &["instructions"]))
        .filter_map(JsonValue::as_str)
        .map(str::to_string)
        .collect();

    Diagnosis {
        error_type: owned_text(fields, &["errorType", "error_type"])
            .unwrap_or_else(|| UNKNOWN_ERROR_TYPE.to_string()),
        root_cause,
        fixes,
        instructions,
        confidence_score: confidence(fields),
        explanation,
        degraded: false,
    }
}
