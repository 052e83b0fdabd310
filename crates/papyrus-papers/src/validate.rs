use std::sync::LazyLock;

use regex::Regex;

use crate::error::SourceError;

pub const MIN_QUERY_CHARS: usize = 3;
pub const MAX_RESULTS_LIMIT: usize = 50;

const SUSPICIOUS_PATTERNS: &[&str] = &[
    "<script",
    "javascript:",
    "onerror=",
    "onclick=",
    "eval(",
    "exec(",
];

static ARXIV_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}\.\d{4,5}|[a-z]+(?:-[a-z]+)?(?:\.[A-Z]{2})?/\d{7})(?:v\d+)?$")
        .expect("arxiv id regex is valid")
});

/// Check a search query before any network call.
///
/// # Errors
///
/// Returns [`SourceError::InvalidQuery`] when the query has fewer than three
/// non-whitespace characters or contains a script-injection pattern.
pub fn validate_query(query: &str) -> Result<(), SourceError> {
    let visible = query.chars().filter(|c| !c.is_whitespace()).count();
    if visible < MIN_QUERY_CHARS {
        return Err(SourceError::InvalidQuery(format!(
            "query must contain at least {MIN_QUERY_CHARS} characters"
        )));
    }
    let lower = query.to_lowercase();
    if let Some(pattern) = SUSPICIOUS_PATTERNS.iter().find(|p| lower.contains(*p)) {
        tracing::warn!("suspicious pattern detected in query: {pattern}");
        return Err(SourceError::InvalidQuery(
            "query contains a disallowed pattern".into(),
        ));
    }
    Ok(())
}

/// # Errors
///
/// Returns [`SourceError::InvalidQuery`] when `max_results` is outside `1..=50`.
pub fn validate_max_results(max_results: usize) -> Result<(), SourceError> {
    if (1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        Ok(())
    } else {
        Err(SourceError::InvalidQuery(format!(
            "max_results must be between 1 and {MAX_RESULTS_LIMIT}, got {max_results}"
        )))
    }
}

/// `YYMM.NNNN[N]`, or the pre-2007 `archive[.SC]/YYMMNNN`, with an optional
/// version suffix.
#[must_use]
pub fn is_arxiv_id(id: &str) -> bool {
    ARXIV_ID.is_match(id)
}
