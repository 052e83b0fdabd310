use serde::{Deserialize, Serialize};

/// Per-item outcome of a multi-item operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome<T> {
    Ok(T),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem<T> {
    pub id: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome<T>,
}

impl<T> BatchItem<T> {
    #[must_use]
    pub fn ok(id: impl Into<String>, value: T) -> Self {
        Self {
            id: id.into(),
            outcome: ItemOutcome::Ok(value),
        }
    }

    #[must_use]
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: ItemOutcome::Error(message.into()),
        }
    }

    /// Convert a `Result` into an item, rendering the error with `Display`.
    pub fn from_result<E: std::fmt::Display>(id: impl Into<String>, result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::ok(id, v),
            Err(e) => Self::error(id, e.to_string()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Ok(_))
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            ItemOutcome::Ok(v) => Some(v),
            ItemOutcome::Error(_) => None,
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Ok(_) => None,
            ItemOutcome::Error(m) => Some(m),
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self.outcome {
            ItemOutcome::Ok(v) => Some(v),
            ItemOutcome::Error(_) => None,
        }
    }
}

/// Number of successful items in a batch.
#[must_use]
pub fn succeeded<T>(items: &[BatchItem<T>]) -> usize {
    items.iter().filter(|i| i.is_ok()).count()
}
