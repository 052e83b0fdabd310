mod env;
mod types;


pub use types::*;

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting values fail [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str::<Self>(&content)?
        } else {
            tracing::debug!("config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the components cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.papers.default_max_results == 0
            || self.papers.default_max_results > papyrus_papers::validate::MAX_RESULTS_LIMIT
        {
            return Err(ConfigError::Invalid(format!(
                "papers.default_max_results must be in 1..={}",
                papyrus_papers::validate::MAX_RESULTS_LIMIT
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be at least 1".into()));
        }
        if self.rag.context_chars == 0 {
            return Err(ConfigError::Invalid(
                "rag.context_chars must be at least 1".into(),
            ));
        }
        if self.summarizer.full_content_chars == 0 || self.summarizer.brief_content_chars == 0 {
            return Err(ConfigError::Invalid(
                "summarizer content limits must be at least 1".into(),
            ));
        }
        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("store.collection must not be empty".into()));
        }
        if self.gateway.rate_limit == 0 {
            return Err(ConfigError::Invalid(
                "gateway.rate_limit must be at least 1".into(),
            ));
        }
        if self.timeouts.request_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.request_seconds must be at least 1".into(),
            ));
        }
        if self.llm.provider == ProviderKind::OpenAi && self.secrets.openai_api_key.is_none() {
            return Err(ConfigError::Invalid(
                "llm.provider = \"openai\" requires PAPYRUS_OPENAI_API_KEY".into(),
            ));
        }
        Ok(())
    }
}
