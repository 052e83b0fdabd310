use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Indexed text unit belonging to one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub paper_id: String,
    pub text: String,
    /// `title`, `authors`, `source`, `id`, `published`.
    pub metadata: BTreeMap<String, String>,
}

impl IndexedChunk {
    #[must_use]
    pub fn meta(&self, key: &str) -> &str {
        self.metadata.get(key).map_or("", String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: IndexedChunk,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub count: u64,
    pub backend: String,
    pub collection: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_defaults_to_empty() {
        let chunk = IndexedChunk {
            id: "c".into(),
            paper_id: "arxiv:1".into(),
            text: "t".into(),
            metadata: BTreeMap::from([("title".into(), "Title".into())]),
        };
        assert_eq!(chunk.meta("title"), "Title");
        assert_eq!(chunk.meta("published"), "");
    }

    #[test]
    fn stats_serialize() {
        let stats = StoreStats {
            count: 3,
            backend: "sqlite".into(),
            collection: "papers".into(),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json, serde_json::json!({"count": 3, "backend": "sqlite", "collection": "papers"}));
    }
}
