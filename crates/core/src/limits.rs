//! Size limits applied to error logs.

use std::borrow::Cow;

/// Maximum number of characters of the error text kept on a job record.
pub const STORED_LOG_LENGTH: usize = 2000;

/// Maximum number of characters of the error log handed to the analysis agent.
pub const AI_LOG_LENGTH: usize = 5000;

/// Default size of the bounded job history.
pub const MAX_HISTORY_SIZE: usize = 100;

const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Keep at most `max_chars` characters of `text` (never splits a character).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate a log to `max_chars`, cutting back to the last complete line and
/// appending a marker. Logs within the limit are returned unchanged.
pub fn truncate_log(text: &str, max_chars: usize) -> Cow<'_, str> {
    let head = truncate_chars(text, max_chars);
    if head.len() == text.len() {
        return Cow::Borrowed(text);
    }

    let head = match head.rfind('\n') {
        Some(pos) if pos > 0 => &head[..pos],
        _ => head,
    };
    Cow::Owned(format!("{head}{TRUNCATION_MARKER}"))
}
