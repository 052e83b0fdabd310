//! Named prompt templates with `{variable}` substitution.
//!
//! Built-in templates cover every generation path. A directory of `<name>.txt`
//! files may override them or add new ones. Literal braces are written `{{` and `}}`.

use std::collections::BTreeMap;
use std::path::Path;

pub const QA_PROMPT: &str = "qa_prompt";
pub const SUMMARIZATION_PROMPT: &str = "summarization_prompt";
pub const SHORT_SUMMARY_PROMPT: &str = "short_summary_prompt";
pub const BULLET_PROMPT: &str = "bullet_prompt";
pub const CITATION_PROMPT: &str = "citation_prompt";

const DEFAULT_QA: &str = "\
Use the following context from research papers to answer the question.

Context:
{context}

Question: {question}

Answer based on the context provided. If the answer is not in the context, say so.";

const DEFAULT_SUMMARIZATION: &str = "\
Create a detailed summary of the following research paper.

Title: {title}
Authors: {authors}
Published: {published}

Paper Content:
{content}

Create a comprehensive summary with:
1. Overview
2. Key Findings
3. Methodology
4. Contributions
5. Limitations
6. Conclusion

Summary:";

const DEFAULT_SHORT_SUMMARY: &str = "\
Summarize the following research paper in {max_length} words or less.

Title: {title}
Content: {content}

Summary:";

const DEFAULT_BULLETS: &str = "\
Create {num_points} key bullet points summarizing this research paper.
Start every bullet point with \"- \".

Title: {title}
Content: {content}

Bullet Points:";

const DEFAULT_CITATION: &str = "\
Generate a citation in {style} format for the following paper:

Title: {title}
Authors: {authors}
Year: {year}
Journal: {journal}
DOI: {doi}
URL: {url}

Reply with the citation only.

Citation ({style} format):";

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("unknown prompt template: {0}")]
    Unknown(String),

    #[error("prompt {prompt} references missing variable {{{var}}}")]
    MissingVariable { prompt: String, var: String },

    #[error("prompt {0} has an unclosed placeholder")]
    Unclosed(String),

    #[error("failed to read prompt directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PromptManager {
    templates: BTreeMap<String, String>,
}

impl Default for PromptManager {
    fn default() -> Self {
        let templates = [
            (QA_PROMPT, DEFAULT_QA),
            (SUMMARIZATION_PROMPT, DEFAULT_SUMMARIZATION),
            (SHORT_SUMMARY_PROMPT, DEFAULT_SHORT_SUMMARY),
            (BULLET_PROMPT, DEFAULT_BULLETS),
            (CITATION_PROMPT, DEFAULT_CITATION),
        ]
        .into_iter()
        .map(|(name, body)| (name.to_owned(), body.to_owned()))
        .collect();
        Self { templates }
    }
}

impl PromptManager {
    /// Built-in templates overlaid with every `*.txt` file in `dir`.
    ///
    /// Unreadable individual files are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Io`] if the directory itself cannot be listed.
    pub fn from_dir(dir: &Path) -> Result<Self, PromptError> {
        let mut manager = Self::default();
        let entries = std::fs::read_dir(dir).map_err(|source| PromptError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut loaded = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(body) => {
                    tracing::debug!("loaded prompt override: {name}");
                    manager.templates.insert(name.to_owned(), body.trim().to_owned());
                    loaded += 1;
                }
                Err(e) => tracing::warn!("failed to load prompt {}: {e}", path.display()),
            }
        }
        tracing::info!(
            "prompt manager ready: {} templates ({loaded} from {})",
            manager.templates.len(),
            dir.display()
        );
        Ok(manager)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Fill `{var}` placeholders of template `name` from `vars`.
    ///
    /// Substituted values are inserted verbatim and never re-scanned.
    ///
    /// # Errors
    ///
    /// Fails for an unknown template, a placeholder without a value, or an
    /// unterminated `{`.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let template = self
            .get(name)
            .ok_or_else(|| PromptError::Unknown(name.to_owned()))?;

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{{") {
                out.push('{');
                rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                out.push('}');
                rest = after;
            } else if let Some(after) = tail.strip_prefix('{') {
                let end = after
                    .find('}')
                    .ok_or_else(|| PromptError::Unclosed(name.to_owned()))?;
                let var = &after[..end];
                let value = vars
                    .iter()
                    .find(|(k, _)| *k == var)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| PromptError::MissingVariable {
                        prompt: name.to_owned(),
                        var: var.to_owned(),
                    })?;
                out.push_str(value);
                rest = &after[end + 1..];
            } else {
                // lone '}'
                out.push('}');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
