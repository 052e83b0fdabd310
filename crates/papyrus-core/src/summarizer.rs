//! Full, short and bullet-point paper summaries.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use papyrus_llm::provider::LlmProvider;
use papyrus_papers::{BatchItem, PaperLoader, PaperRecord};
use serde::{Deserialize, Serialize};

use crate::error::AssistantError;
use crate::prompts::{BULLET_PROMPT, PromptManager, SHORT_SUMMARY_PROMPT, SUMMARIZATION_PROMPT};
use crate::text::{require_text, truncate_chars};

pub const FULL_CONTENT_CHARS: usize = 8000;
pub const BRIEF_CONTENT_CHARS: usize = 4000;
pub const DEFAULT_SHORT_WORDS: usize = 200;
pub const DEFAULT_BULLET_POINTS: usize = 5;

const BULLET_MARKERS: &[char] = &['-', '•'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    #[default]
    #[serde(alias = "detailed")]
    Full,
    Short,
    #[serde(alias = "bullet_points")]
    Bullets,
}

impl SummaryFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Short => "short",
            Self::Bullets => "bullets",
        }
    }
}

impl fmt::Display for SummaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryFormat {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" | "detailed" => Ok(Self::Full),
            "short" => Ok(Self::Short),
            "bullets" | "bullet_points" => Ok(Self::Bullets),
            other => Err(AssistantError::InvalidInput(format!(
                "unknown summary format '{other}' (expected full, short or bullets)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published: Option<String>,
    pub length: usize,
}

/// Summary of one paper in any format, with the paper's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub summary: String,
    pub format: SummaryFormat,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub published: Option<String>,
    /// Individual bullets for [`SummaryFormat::Bullets`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<String>,
}

/// Per-format knobs; zero values are rejected.
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    pub format: SummaryFormat,
    pub max_length: usize,
    pub num_points: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            format: SummaryFormat::Full,
            max_length: DEFAULT_SHORT_WORDS,
            num_points: DEFAULT_BULLET_POINTS,
        }
    }
}

impl SummaryOptions {
    #[must_use]
    pub fn format(format: SummaryFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}

pub struct Summarizer<P> {
    provider: P,
    prompts: Arc<PromptManager>,
    loader: Arc<PaperLoader>,
    full_chars: usize,
    brief_chars: usize,
}

impl<P: LlmProvider> Summarizer<P> {
    #[must_use]
    pub fn new(provider: P, prompts: Arc<PromptManager>, loader: Arc<PaperLoader>) -> Self {
        Self {
            provider,
            prompts,
            loader,
            full_chars: FULL_CONTENT_CHARS,
            brief_chars: BRIEF_CONTENT_CHARS,
        }
    }

    #[must_use]
    pub fn with_content_limits(mut self, full_chars: usize, brief_chars: usize) -> Self {
        self.full_chars = full_chars;
        self.brief_chars = brief_chars;
        self
    }

    /// Structured summary of `content`, truncated to the full-summary budget.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for blank title or content, `Generation` when the
    /// provider fails or returns nothing.
    pub async fn summarize(
        &self,
        title: &str,
        content: &str,
        authors: &[String],
        published: Option<&str>,
    ) -> Result<Summary, AssistantError> {
        require_text("title", title)?;
        require_text("content", content)?;

        let content = clip(content, self.full_chars);
        let authors_str = if authors.is_empty() {
            "Unknown Authors".to_owned()
        } else {
            authors.join(", ")
        };
        let prompt = self.prompts.render(
            SUMMARIZATION_PROMPT,
            &[
                ("title", title),
                ("authors", authors_str.as_str()),
                ("published", published.unwrap_or("Unknown Date")),
                ("content", content),
            ],
        )?;

        tracing::info!("summarizing paper: {}", truncate_chars(title, 50));
        let summary = self.generate(&prompt).await?;
        tracing::info!("generated summary ({} chars)", summary.chars().count());
        Ok(Summary {
            length: summary.chars().count(),
            summary,
            title: title.to_owned(),
            authors: authors.to_vec(),
            published: published.map(str::to_owned),
        })
    }

    /// Abstract-length summary of at most `max_length` words (as asked of the model).
    ///
    /// # Errors
    ///
    /// `InvalidInput` for blank inputs or `max_length == 0`, `Generation` on
    /// provider failure.
    pub async fn summarize_short(
        &self,
        title: &str,
        content: &str,
        max_length: usize,
    ) -> Result<String, AssistantError> {
        require_text("title", title)?;
        require_text("content", content)?;
        if max_length == 0 {
            return Err(AssistantError::InvalidInput(
                "max_length must be at least 1".into(),
            ));
        }

        let content = clip(content, self.brief_chars);
        let max_length = max_length.to_string();
        let prompt = self.prompts.render(
            SHORT_SUMMARY_PROMPT,
            &[("title", title), ("content", content), ("max_length", max_length.as_str())],
        )?;
        self.generate(&prompt).await
    }

    /// At most `num_points` bullets parsed from the model output.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for blank inputs or `num_points == 0`, `Generation` on
    /// provider failure.
    pub async fn summarize_bullets(
        &self,
        title: &str,
        content: &str,
        num_points: usize,
    ) -> Result<Vec<String>, AssistantError> {
        require_text("title", title)?;
        require_text("content", content)?;
        if num_points == 0 {
            return Err(AssistantError::InvalidInput(
                "num_points must be at least 1".into(),
            ));
        }

        let content = clip(content, self.brief_chars);
        let n = num_points.to_string();
        let prompt = self.prompts.render(
            BULLET_PROMPT,
            &[("title", title), ("content", content), ("num_points", n.as_str())],
        )?;
        let raw = self.generate(&prompt).await?;
        let points = parse_bullets(&raw, num_points);
        tracing::info!("generated {} bullet points", points.len());
        Ok(points)
    }

    /// Load a paper by id and summarize its full text, else its abstract.
    ///
    /// # Errors
    ///
    /// Loader errors (`InvalidInput`, `NotFound`, `Upstream`) plus those of the
    /// chosen format.
    pub async fn summarize_paper(
        &self,
        paper_id: &str,
        options: SummaryOptions,
    ) -> Result<PaperSummary, AssistantError> {
        let paper = self.loader.load_by_id(paper_id).await?;
        self.summarize_record(&paper, options).await
    }

    /// Summarize caller-supplied text in any format; the result carries no paper id.
    ///
    /// # Errors
    ///
    /// Same as the chosen format's operation.
    pub async fn summarize_text(
        &self,
        title: &str,
        content: &str,
        options: SummaryOptions,
    ) -> Result<PaperSummary, AssistantError> {
        let paper = PaperRecord::new("", title, "").with_full_text(content);
        self.summarize_record(&paper, options).await
    }

    /// Summarize an already loaded record.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the record has no content, plus the errors of the format.
    pub async fn summarize_record(
        &self,
        paper: &PaperRecord,
        options: SummaryOptions,
    ) -> Result<PaperSummary, AssistantError> {
        let content = paper
            .full_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(paper.summary.as_deref())
            .unwrap_or_default();

        let mut out = match options.format {
            SummaryFormat::Full => {
                let s = self
                    .summarize(&paper.title, content, &paper.authors, paper.published.as_deref())
                    .await?;
                PaperSummary::from_parts(paper, options.format, s.summary, Vec::new())
            }
            SummaryFormat::Short => {
                let s = self
                    .summarize_short(&paper.title, content, options.max_length)
                    .await?;
                PaperSummary::from_parts(paper, options.format, s, Vec::new())
            }
            SummaryFormat::Bullets => {
                let points = self
                    .summarize_bullets(&paper.title, content, options.num_points)
                    .await?;
                let joined = points
                    .iter()
                    .map(|p| format!("• {p}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                PaperSummary::from_parts(paper, options.format, joined, points)
            }
        };
        if !paper.id.is_empty() {
            out.paper_id = Some(paper.id.clone());
        }
        Ok(out)
    }

    /// Full summaries for every id; failures become error items.
    pub async fn summarize_multiple(&self, paper_ids: &[String]) -> Vec<BatchItem<PaperSummary>> {
        tracing::info!("summarizing {} papers", paper_ids.len());
        let mut items = Vec::with_capacity(paper_ids.len());
        for id in paper_ids {
            let result = self.summarize_paper(id, SummaryOptions::default()).await;
            if let Err(e) = &result {
                tracing::warn!("failed to summarize {id}: {e}");
            }
            items.push(BatchItem::from_result(id.clone(), result));
        }
        tracing::info!(
            "summarized {}/{} papers",
            papyrus_papers::batch::succeeded(&items),
            paper_ids.len()
        );
        items
    }

    async fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        let raw = self.provider.complete(prompt).await.map_err(|e| {
            tracing::error!("summarization failed: {e}");
            AssistantError::from(e)
        })?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(AssistantError::Generation(format!(
                "{} returned an empty summary",
                self.provider.name()
            )));
        }
        Ok(text.to_owned())
    }
}

impl PaperSummary {
    fn from_parts(
        paper: &PaperRecord,
        format: SummaryFormat,
        summary: String,
        points: Vec<String>,
    ) -> Self {
        Self {
            length: summary.chars().count(),
            summary,
            format,
            paper_id: None,
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            published: paper.published.clone(),
            points,
        }
    }
}

fn clip(content: &str, limit: usize) -> &str {
    let clipped = truncate_chars(content, limit);
    if clipped.len() < content.len() {
        tracing::warn!(
            "content too long ({} chars), truncating to {limit}",
            content.chars().count()
        );
    }
    clipped
}

/// Lines starting with `-` or `•` after trimming, markers removed, first `limit` kept.
#[must_use]
pub fn parse_bullets(raw: &str, limit: usize) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.starts_with(BULLET_MARKERS))
        .map(|line| line.trim_start_matches(BULLET_MARKERS).trim().to_owned())
        .filter(|point| !point.is_empty())
        .take(limit)
        .collect()
}
