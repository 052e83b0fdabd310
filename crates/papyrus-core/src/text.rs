//! Input sanitation and char-boundary truncation shared by the generators.

use crate::error::AssistantError;

pub const MAX_QUESTION_CHARS: usize = 10_000;

/// Longest prefix of `s` holding at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Trim, drop NUL bytes and cap at [`MAX_QUESTION_CHARS`].
///
/// # Errors
///
/// Returns [`AssistantError::InvalidInput`] when nothing visible remains.
pub fn sanitize_question(question: &str) -> Result<String, AssistantError> {
    let cleaned: String = question.chars().filter(|&c| c != '\0').collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Err(AssistantError::InvalidInput("question must not be empty".into()));
    }
    let capped = truncate_chars(trimmed, MAX_QUESTION_CHARS);
    if capped.len() < trimmed.len() {
        tracing::warn!(
            "question truncated to {MAX_QUESTION_CHARS} chars (was {})",
            trimmed.chars().count()
        );
    }
    Ok(capped.trim_end().to_owned())
}

/// Rejects blank required text fields.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), AssistantError> {
    if value.trim().is_empty() {
        return Err(AssistantError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
