use std::collections::HashMap;
use std::sync::RwLock;

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
    cosine_similarity, rank,
};

struct StoredPoint {
    seq: u64,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Default)]
struct InMemoryCollection {
    points: HashMap<String, StoredPoint>,
    next_seq: u64,
}

/// Ephemeral backend; contents are lost when the process exits.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore").finish_non_exhaustive()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        _vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection).or_default();
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            for p in points {
                let seq = match col.points.get(&p.id) {
                    Some(existing) => existing.seq,
                    None => {
                        col.next_seq += 1;
                        col.next_seq
                    }
                };
                col.points.insert(
                    p.id,
                    StoredPoint {
                        seq,
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let mut entries: Vec<(&String, &StoredPoint)> = col
                .points
                .iter()
                .filter(|(_, sp)| filter.as_ref().is_none_or(|f| f.matches(&sp.payload)))
                .collect();
            entries.sort_by_key(|(_, sp)| sp.seq);

            let mut scored: Vec<ScoredVectorPoint> = entries
                .into_iter()
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();
            rank(&mut scored, limit);
            Ok(scored)
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            let Some(col) = cols.get_mut(&collection) else {
                return Ok(());
            };
            for id in &ids {
                col.points.remove(id);
            }
            Ok(())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols
                .get(&collection)
                .map_or(0, |c| u64::try_from(c.points.len()).unwrap_or(u64::MAX)))
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, source: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("source".into(), serde_json::json!(source))]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_and_exists() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("papers").await.unwrap());
        store.ensure_collection("papers", 3).await.unwrap();
        store.ensure_collection("papers", 3).await.unwrap();
        assert!(store.collection_exists("papers").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_and_search() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("papers", 3).await.unwrap();
        store
            .upsert(
                "papers",
                vec![
                    point("a", vec![1.0, 0.0, 0.0], "arxiv"),
                    point("b", vec![0.0, 1.0, 0.0], "arxiv"),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search("papers", vec![1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn overflowing_vectors_rank_last() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("papers", 2).await.unwrap();
        let huge = vec![f32::MAX, f32::MAX];
        let mut points: Vec<_> = (0..40)
            .map(|i| point(&format!("huge{i}"), huge.clone(), "arxiv"))
            .collect();
        points.push(point("plain", vec![1.0, 0.0], "arxiv"));
        store.upsert("papers", points).await.unwrap();

        // 2 * f32::MAX overflows the dot product, so huge points score inf / inf
        let results = store.search("papers", vec![2.0, 0.0], 5, None).await.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].id, "plain");
    }

    #[tokio::test]
    async fn upsert_without_collection_fails() {
        let store = InMemoryVectorStore::new();
        let err = store
            .upsert("missing", vec![point("a", vec![1.0], "arxiv")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn ties_follow_insertion_order_and_survive_overwrite() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("papers", 2).await.unwrap();
        for id in ["first", "second", "third"] {
            store
                .upsert("papers", vec![point(id, vec![1.0, 0.0], "arxiv")])
                .await
                .unwrap();
        }
        store
            .upsert("papers", vec![point("first", vec![1.0, 0.0], "arxiv")])
            .await
            .unwrap();

        let results = store.search("papers", vec![1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["first", "second", "third"]);
        assert_eq!(store.count("papers").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn search_with_filter() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("papers", 3).await.unwrap();
        store
            .upsert(
                "papers",
                vec![
                    point("a", vec![1.0, 0.0, 0.0], "arxiv"),
                    point("b", vec![0.9, 0.1, 0.0], "pubmed"),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search(
                "papers",
                vec![1.0, 0.0, 0.0],
                10,
                Some(VectorFilter::must_equal("source", "pubmed")),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn delete_by_ids_removes_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("papers", 3).await.unwrap();
        store
            .upsert("papers", vec![point("a", vec![1.0, 0.0, 0.0], "arxiv")])
            .await
            .unwrap();
        store.delete_by_ids("papers", vec!["a".into()]).await.unwrap();
        assert_eq!(store.count("papers").await.unwrap(), 0);
        store.delete_by_ids("missing", vec!["a".into()]).await.unwrap();
    }

    #[tokio::test]
    async fn count_missing_collection_is_zero() {
        let store = InMemoryVectorStore::default();
        assert_eq!(store.count("nope").await.unwrap(), 0);
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn debug_format() {
        let dbg = format!("{:?}", InMemoryVectorStore::new());
        assert!(dbg.contains("InMemoryVectorStore"));
    }
}
