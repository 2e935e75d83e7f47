//! Deterministic rule-based classification of CI error logs.
//!
//! Categories are checked in a fixed priority order; the first category with
//! a matching token wins. Matching is a case-insensitive substring search.

use std::sync::LazyLock;

use regex::Regex;

use cifixer_core::{Diagnosis, FixSuggestion};

/// Error category detected in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Dependency,
    Syntax,
    Test,
    Build,
    Permission,
    Timeout,
    Network,
    Unknown,
}

/// Priority order and tokens (lowercase).
const RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Dependency,
        &["npm err!", "package not found", "module not found", "cannot find module", "modulenotfounderror"],
    ),
    (ErrorCategory::Syntax, &["syntax error", "syntaxerror", "unexpected token"]),
    (ErrorCategory::Test, &["test failed", "assertion error", "assertionerror", "expected"]),
    (ErrorCategory::Build, &["build failed", "compilation error", "compilation failed"]),
    (ErrorCategory::Permission, &["permission denied", "eacces"]),
    (ErrorCategory::Timeout, &["timeout", "timed out"]),
    (ErrorCategory::Network, &["network", "enotfound", "econnrefused"]),
];

impl ErrorCategory {
    /// Categories in the order they are tested.
    pub const PRIORITY: [ErrorCategory; 7] = [
        ErrorCategory::Dependency,
        ErrorCategory::Syntax,
        ErrorCategory::Test,
        ErrorCategory::Build,
        ErrorCategory::Permission,
        ErrorCategory::Timeout,
        ErrorCategory::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Dependency => "dependency",
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Test => "test",
            ErrorCategory::Build => "build",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Canned remediation for this category. Syntax and build fixes carry
    /// the line number found in `error_text`, if any.
    pub fn remediation(&self, error_text: &str) -> Diagnosis {
        let line = match self {
            ErrorCategory::Syntax | ErrorCategory::Build => extract_line_number(error_text),
            _ => None,
        };
        let fix = |file: &str, description: &str, change: &str| {
            FixSuggestion::new(file, description)
                .with_code_change(change)
                .with_line_number(line)
        };

        let (fixes, instructions, explanation): (Vec<FixSuggestion>, &[&str], &str) = match self {
            ErrorCategory::Dependency => (
                vec![fix("package.json", "Install missing dependencies", "Run: npm install")],
                &[
                    "Run npm install to install missing dependencies",
                    "Check if package.json has the correct dependency versions",
                    "Clear npm cache with: npm cache clean --force",
                    "Delete node_modules and package-lock.json, then reinstall",
                ],
                "A required dependency could not be resolved. Reinstall dependencies and check the declared versions.",
            ),
            ErrorCategory::Syntax => (
                vec![fix("unknown", "Fix syntax error", "Check the error line and fix syntax")],
                &[
                    "Review the syntax error at the indicated line",
                    "Check for missing brackets, parentheses, or semicolons",
                    "Ensure proper indentation and formatting",
                    "Run linter to catch additional issues",
                ],
                "The source failed to parse. Correct the syntax at the reported location.",
            ),
            ErrorCategory::Test => (
                vec![fix("test files", "Fix failing tests", "Update test assertions or fix code logic")],
                &[
                    "Review the test failure message",
                    "Update test expectations if behavior changed intentionally",
                    "Fix the code logic to match test expectations",
                    "Run tests locally before pushing",
                ],
                "One or more tests failed. Either the code or the test expectations need updating.",
            ),
            ErrorCategory::Build => (
                vec![fix(
                    "build configuration",
                    "Fix build configuration",
                    "Check build scripts and configuration files",
                )],
                &[
                    "Check build configuration files",
                    "Ensure all required build tools are installed",
                    "Verify environment variables are set correctly",
                    "Review build logs for specific error messages",
                ],
                "The build step failed. Check the build configuration and toolchain.",
            ),
            ErrorCategory::Permission => (
                vec![fix(
                    "CI workflow",
                    "Fix permission issues",
                    "Add chmod commands or update workflow permissions",
                )],
                &[
                    "Add execute permissions: chmod +x script.sh",
                    "Update GitHub Actions permissions in workflow file",
                    "Check file ownership and access rights",
                ],
                "A step was denied access to a file or resource.",
            ),
            ErrorCategory::Timeout => (
                vec![fix(
                    ".github/workflows",
                    "Increase timeout duration",
                    "Add timeout-minutes: 30 to workflow step",
                )],
                &[
                    "Increase timeout in workflow configuration",
                    "Optimize slow operations",
                    "Check for hanging processes or infinite loops",
                ],
                "A step exceeded its time limit.",
            ),
            ErrorCategory::Network => (
                vec![fix(
                    "CI workflow",
                    "Retry or stabilise network access",
                    "Add a retry around the failing download or pin a reachable mirror",
                )],
                &[
                    "Check whether the remote host was reachable from the runner",
                    "Retry the workflow to rule out a transient outage",
                    "Configure a registry mirror or cache for dependencies",
                ],
                "A network request from the runner failed.",
            ),
            ErrorCategory::Unknown => (
                Vec::new(),
                &[
                    "Review the full error log carefully",
                    "Search for similar issues online",
                    "Check recent code changes that might have caused the issue",
                    "Consult documentation for the failing component",
                ],
                "No known failure pattern was recognised; manual investigation is required.",
            ),
        };

        Diagnosis {
            error_type: self.as_str().to_string(),
            root_cause: format!("Detected {} error in CI workflow", self.as_str()),
            fixes,
            instructions: instructions.iter().map(|s| s.to_string()).collect(),
            confidence_score: 0.0,
            explanation: Some(explanation.to_string()),
            degraded: true,
        }
    }
}

impl core::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error log by the first matching category in priority order.
pub fn classify(error_text: &str) -> ErrorCategory {
    let log = error_text.to_lowercase();
    RULES
        .iter()
        .find(|(_, tokens)| tokens.iter().any(|t| log.contains(t)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}

static LINE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)line (\d+)").expect("static regex"));
static LINE_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":(\d+):").expect("static regex"));

/// First `line <N>` occurrence, else first `:N:` occurrence.
pub fn extract_line_number(error_text: &str) -> Option<u32> {
    LINE_WORD
        .captures(error_text)
        .or_else(|| LINE_COLON.captures(error_text))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
