use serde::{Deserialize, Serialize};

/// Metadata and optional content of one paper as returned by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Namespaced identifier, e.g. `arxiv:2301.12345`.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    pub source: String,
}

impl PaperRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            published: None,
            summary: None,
            full_text: None,
            pdf_url: None,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn with_full_text(mut self, text: impl Into<String>) -> Self {
        self.full_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = Some(published.into());
        self
    }

    /// Identifier without its namespace prefix.
    #[must_use]
    pub fn bare_id(&self) -> &str {
        self.id.split_once(':').map_or(self.id.as_str(), |(_, rest)| rest)
    }

    /// Best available body: full text, else summary, else title.
    #[must_use]
    pub fn content(&self) -> &str {
        [self.full_text.as_deref(), self.summary.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(&self.title)
    }

    /// Four-digit year prefix of `published`, if present.
    #[must_use]
    pub fn year(&self) -> Option<&str> {
        self.published
            .as_deref()
            .and_then(|p| p.get(..4))
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }

    #[must_use]
    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper() -> PaperRecord {
        PaperRecord::new("arxiv:1706.03762", "Attention Is All You Need", "arxiv")
            .with_authors(["Ashish Vaswani", "Noam Shazeer"])
            .with_published("2017-06-12")
    }

    #[test]
    fn bare_id_strips_namespace() {
        assert_eq!(paper().bare_id(), "1706.03762");
        assert_eq!(PaperRecord::new("local", "t", "s").bare_id(), "local");
    }

    #[test]
    fn content_prefers_full_text_then_summary_then_title() {
        let p = paper();
        assert_eq!(p.content(), "Attention Is All You Need");
        let p = p.with_summary("abstract");
        assert_eq!(p.content(), "abstract");
        let p = p.with_full_text("body");
        assert_eq!(p.content(), "body");
    }

    #[test]
    fn blank_full_text_falls_through() {
        let p = paper().with_full_text("   ").with_summary("abstract");
        assert_eq!(p.content(), "abstract");
    }

    #[test]
    fn year_from_published() {
        assert_eq!(paper().year(), Some("2017"));
        assert_eq!(PaperRecord::new("a", "b", "c").year(), None);
        assert_eq!(
            PaperRecord::new("a", "b", "c").with_published("n/a").year(),
            None
        );
    }

    #[test]
    fn serde_omits_missing_optionals() {
        let json = serde_json::to_value(paper()).unwrap();
        assert!(json.get("summary").is_none());
        assert_eq!(json["authors"][1], "Noam Shazeer");
        let back: PaperRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, paper());
    }
}
