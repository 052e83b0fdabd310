//! APA, MLA, Chicago and BibTeX citations.
//!
//! Formatting is a pure function of the fields. When LLM formatting is
//! enabled, the citation prompt is filled for the style and the provider's
//! trimmed output is returned instead.

use std::fmt;
use std::sync::Arc;

use papyrus_llm::provider::LlmProvider;
use papyrus_papers::PaperRecord;
use serde::{Deserialize, Serialize};

use crate::error::AssistantError;
use crate::prompts::{CITATION_PROMPT, PromptManager};
use crate::text::require_text;

/// APA lists up to 20 authors; longer lists keep 19 plus the last.
const APA_MAX_AUTHORS: usize = 20;
/// Chicago lists up to 10 authors; longer lists keep 7 and "et al."
const CHICAGO_MAX_AUTHORS: usize = 10;
const CHICAGO_TRUNCATED_AUTHORS: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Chicago,
    Bibtex,
}

impl CitationStyle {
    pub const ALL: [Self; 4] = [Self::Apa, Self::Mla, Self::Chicago, Self::Bibtex];

    /// Case-insensitive lookup; unknown names fall back to APA.
    #[must_use]
    pub fn parse_or_default(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "apa" => Self::Apa,
            "mla" => Self::Mla,
            "chicago" => Self::Chicago,
            "bibtex" => Self::Bibtex,
            other => {
                tracing::debug!("unknown citation style '{other}', using apa");
                Self::Apa
            }
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apa => "apa",
            Self::Mla => "mla",
            Self::Chicago => "chicago",
            Self::Bibtex => "bibtex",
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationFields {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Used as the BibTeX key when present.
    #[serde(default)]
    pub id: Option<String>,
}

impl CitationFields {
    #[must_use]
    pub fn from_record(paper: &PaperRecord) -> Self {
        Self {
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            year: paper.year().map(str::to_owned),
            journal: None,
            doi: None,
            url: paper.pdf_url.clone(),
            id: Some(paper.id.clone()),
        }
    }

    fn field(value: Option<&String>) -> Option<&str> {
        value.map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    fn year(&self) -> Option<&str> {
        Self::field(self.year.as_ref())
    }

    fn journal(&self) -> Option<&str> {
        Self::field(self.journal.as_ref())
    }

    fn doi(&self) -> Option<&str> {
        Self::field(self.doi.as_ref())
    }

    fn url(&self) -> Option<&str> {
        Self::field(self.url.as_ref())
    }

    fn authors(&self) -> Vec<&str> {
        self.authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub citation: String,
    pub style: CitationStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllCitations {
    pub apa: String,
    pub mla: String,
    pub chicago: String,
    pub bibtex: String,
}

/// Deterministic citation; never touches the network.
#[must_use]
pub fn format_citation(fields: &CitationFields, style: CitationStyle) -> String {
    match style {
        CitationStyle::Apa => apa(fields),
        CitationStyle::Mla => mla(fields),
        CitationStyle::Chicago => chicago(fields),
        CitationStyle::Bibtex => bibtex(fields),
    }
}

fn split_name(name: &str) -> (&str, Vec<&str>) {
    let mut parts: Vec<&str> = name.split_whitespace().collect();
    let last = parts.pop().unwrap_or_default();
    (last, parts)
}

/// "Vaswani, A." / "Vaswani" for single-word names.
fn apa_name(name: &str) -> String {
    let (last, given) = split_name(name);
    if given.is_empty() {
        return last.to_owned();
    }
    let initials: Vec<String> = given
        .iter()
        .filter_map(|p| p.chars().next())
        .map(|c| format!("{c}."))
        .collect();
    format!("{last}, {}", initials.join(" "))
}

/// "Vaswani, Ashish" / "Vaswani".
fn inverted_name(name: &str) -> String {
    let (last, given) = split_name(name);
    if given.is_empty() {
        last.to_owned()
    } else {
        format!("{last}, {}", given.join(" "))
    }
}

fn ensure_period(s: &str) -> String {
    if s.ends_with(['.', '?', '!']) {
        s.to_owned()
    } else {
        format!("{s}.")
    }
}

/// "Vaswani, A.", "Vaswani, A., & Shazeer, N.", or 19 names, "...", and the last.
fn apa_authors(authors: &[&str]) -> Option<String> {
    let names: Vec<String> = authors.iter().map(|a| apa_name(a)).collect();
    match names.as_slice() {
        [] => None,
        [only] => Some(only.clone()),
        [head @ .., last] if names.len() <= APA_MAX_AUTHORS => {
            Some(format!("{}, & {last}", head.join(", ")))
        }
        [.., last] => Some(format!(
            "{}, ... {last}",
            names[..APA_MAX_AUTHORS - 1].join(", ")
        )),
    }
}

fn apa(fields: &CitationFields) -> String {
    let mut segments = Vec::new();
    if let Some(names) = apa_authors(&fields.authors()) {
        segments.push(names);
    }
    if let Some(year) = fields.year() {
        segments.push(format!("({year})."));
    } else if let Some(first) = segments.first_mut() {
        *first = ensure_period(first);
    }
    segments.push(ensure_period(fields.title.trim()));
    if let Some(journal) = fields.journal() {
        segments.push(ensure_period(journal));
    }
    if let Some(doi) = fields.doi() {
        segments.push(format!("https://doi.org/{doi}"));
    } else if let Some(url) = fields.url() {
        segments.push(url.to_owned());
    }
    segments.join(" ")
}

fn mla(fields: &CitationFields) -> String {
    let authors = fields.authors();
    let mut segments = Vec::new();
    if let Some(first) = authors.first() {
        let mut name = inverted_name(first);
        if authors.len() > 1 {
            name.push_str(", et al");
        }
        segments.push(ensure_period(&name));
    }
    segments.push(format!("\"{}\"", ensure_period(fields.title.trim())));

    let tail: Vec<&str> = [fields.journal(), fields.year()].into_iter().flatten().collect();
    if !tail.is_empty() {
        segments.push(format!("{}.", tail.join(", ")));
    }
    if let Some(url) = fields.url() {
        segments.push(ensure_period(url));
    }
    segments.join(" ")
}

/// First author inverted, the rest in reading order with "and" before the last.
fn chicago_authors(authors: &[&str]) -> Option<String> {
    let (first, rest) = authors.split_first()?;
    let first = inverted_name(first);
    if authors.len() > CHICAGO_MAX_AUTHORS {
        let shown = &rest[..CHICAGO_TRUNCATED_AUTHORS - 1];
        return Some(format!("{first}, {}, et al", shown.join(", ")));
    }
    Some(match rest {
        [] => first,
        [head @ .., last] => {
            let mut names = vec![first];
            names.extend(head.iter().map(|a| (*a).to_owned()));
            format!("{}, and {last}", names.join(", "))
        }
    })
}

fn chicago(fields: &CitationFields) -> String {
    let mut segments = Vec::new();
    if let Some(names) = chicago_authors(&fields.authors()) {
        segments.push(ensure_period(&names));
    }
    if let Some(year) = fields.year() {
        segments.push(format!("{year}."));
    }
    segments.push(format!("\"{}\"", ensure_period(fields.title.trim())));
    if let Some(journal) = fields.journal() {
        segments.push(ensure_period(journal));
    }
    if let Some(doi) = fields.doi() {
        segments.push(format!("https://doi.org/{doi}."));
    } else if let Some(url) = fields.url() {
        segments.push(ensure_period(url));
    }
    segments.join(" ")
}

fn bibtex_key(fields: &CitationFields) -> String {
    if let Some(id) = CitationFields::field(fields.id.as_ref()) {
        return id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || ":.-_".contains(c) { c } else { '_' })
            .collect();
    }
    let last = fields
        .authors()
        .first()
        .map(|a| split_name(a).0.to_lowercase())
        .filter(|l| !l.is_empty());
    match (last, fields.year()) {
        (Some(last), Some(year)) => format!("{last}{year}"),
        (Some(last), None) => last,
        (None, Some(year)) => format!("unknown{year}"),
        (None, None) => "unknown".to_owned(),
    }
}

fn bibtex(fields: &CitationFields) -> String {
    let authors = fields.authors();
    let mut lines = vec![format!("@article{{{},", bibtex_key(fields))];
    if !authors.is_empty() {
        lines.push(format!("    author = {{{}}},", authors.join(" and ")));
    }
    lines.push(format!("    title = {{{}}},", fields.title.trim()));
    for (name, value) in [
        ("year", fields.year()),
        ("journal", fields.journal()),
        ("doi", fields.doi()),
        ("url", fields.url()),
    ] {
        if let Some(v) = value {
            lines.push(format!("    {name} = {{{v}}},"));
        }
    }
    lines.push("}".to_owned());
    lines.join("\n")
}

pub struct CitationFormatter<P> {
    provider: P,
    prompts: Arc<PromptManager>,
    use_llm: bool,
}

impl<P: LlmProvider> CitationFormatter<P> {
    #[must_use]
    pub fn new(provider: P, prompts: Arc<PromptManager>) -> Self {
        Self {
            provider,
            prompts,
            use_llm: false,
        }
    }

    #[must_use]
    pub fn with_llm(mut self, enabled: bool) -> Self {
        self.use_llm = enabled;
        self
    }

    /// Cite `fields` in `style` (unknown names fall back to APA).
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank title; `Generation` when the LLM path fails.
    pub async fn format(
        &self,
        fields: &CitationFields,
        style: &str,
    ) -> Result<Citation, AssistantError> {
        require_text("title", &fields.title)?;
        let style = CitationStyle::parse_or_default(style);
        let citation = if self.use_llm {
            self.generate(fields, style).await?
        } else {
            format_citation(fields, style)
        };
        tracing::info!("generated {style} citation");
        Ok(Citation { citation, style })
    }

    /// Citations in every supported style.
    ///
    /// # Errors
    ///
    /// Same as [`CitationFormatter::format`].
    pub async fn format_all(&self, fields: &CitationFields) -> Result<AllCitations, AssistantError> {
        require_text("title", &fields.title)?;
        let mut out = Vec::with_capacity(CitationStyle::ALL.len());
        for style in CitationStyle::ALL {
            out.push(self.format(fields, style.as_str()).await?.citation);
        }
        let [apa, mla, chicago, bibtex]: [String; 4] = out
            .try_into()
            .map_err(|_| AssistantError::Generation("citation count mismatch".into()))?;
        Ok(AllCitations {
            apa,
            mla,
            chicago,
            bibtex,
        })
    }

    async fn generate(
        &self,
        fields: &CitationFields,
        style: CitationStyle,
    ) -> Result<String, AssistantError> {
        let authors = fields.authors().join(", ");
        let prompt = self.prompts.render(
            CITATION_PROMPT,
            &[
                ("style", style.as_str()),
                ("title", fields.title.trim()),
                ("authors", authors.as_str()),
                ("year", fields.year().unwrap_or_default()),
                ("journal", fields.journal().unwrap_or_default()),
                ("doi", fields.doi().unwrap_or_default()),
                ("url", fields.url().unwrap_or_default()),
            ],
        )?;
        let raw = self.provider.complete(&prompt).await.map_err(|e| {
            tracing::error!("citation generation failed: {e}");
            AssistantError::from(e)
        })?;
        let citation = raw.trim();
        if citation.is_empty() {
            return Err(AssistantError::Generation(format!(
                "{} returned an empty citation",
                self.provider.name()
            )));
        }
        Ok(citation.to_owned())
    }
}
