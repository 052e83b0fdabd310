//! Keyword intent classification.
//!
//! Rules are evaluated in order and the first match wins, so a query that
//! mentions both summarizing and searching is a summarize request.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Summarize,
    Search,
    Qa,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Search => "search",
            Self::Qa => "qa",
        }
    }

    /// Tag of the component that handles this intent.
    #[must_use]
    pub fn agent(self) -> &'static str {
        match self {
            Self::Summarize => "summarization_agent",
            Self::Search => "search_agent",
            Self::Qa => "qa_agent",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SUMMARIZE_KEYWORDS: &[&str] = &[
    "summarize",
    "summarise",
    "summary",
    "key points",
    "main findings",
    "arxiv:",
];

const SEARCH_KEYWORDS: &[&str] = &[
    "find",
    "search",
    "papers on",
    "research about",
    "discover",
    "look for",
];

static ID_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}\.\d{4,5}").expect("id fragment regex is valid"));

static ID_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r"(?i)arxiv:(\d{4}\.\d{4,5})",
        r"(\d{4}\.\d{4,5})",
        r"(?i)paper\s+(\d{4}\.\d{4,5})",
    ]
    .map(|p| Regex::new(p).expect("paper id regex is valid"))
});

struct Rule {
    intent: Intent,
    matches: fn(&str) -> bool,
}

fn contains_any(query: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| query.contains(k))
}

fn wants_summary(query: &str) -> bool {
    contains_any(query, SUMMARIZE_KEYWORDS) || ID_FRAGMENT.is_match(query)
}

fn wants_search(query: &str) -> bool {
    contains_any(query, SEARCH_KEYWORDS)
}

/// Ordered rule table over the lower-cased query; `Qa` when nothing matches.
const RULES: &[Rule] = &[
    Rule {
        intent: Intent::Summarize,
        matches: wants_summary,
    },
    Rule {
        intent: Intent::Search,
        matches: wants_search,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Bare paper id for summarize requests that name one.
    pub paper_id: Option<String>,
}

/// Classify `query` without side effects.
#[must_use]
pub fn classify(query: &str) -> Classification {
    let lowered = query.to_lowercase();
    let intent = RULES
        .iter()
        .find(|rule| (rule.matches)(&lowered))
        .map_or(Intent::Qa, |rule| rule.intent);

    let paper_id = match intent {
        Intent::Summarize => extract_paper_id(query),
        Intent::Search | Intent::Qa => None,
    };
    tracing::debug!("routed query to {intent} (paper id: {paper_id:?})");
    Classification { intent, paper_id }
}

/// First id captured by the namespaced, bare and "paper <id>" patterns, in that order.
#[must_use]
pub fn extract_paper_id(query: &str) -> Option<String> {
    ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(query))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}
