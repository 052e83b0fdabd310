//! Local persistent backend: vectors in `SQLite`, brute-force cosine search.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::MemoryError;
use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
    cosine_similarity, rank,
};

#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (or create) the `SQLite` database and run migrations.
    ///
    /// `:memory:` opens a private in-memory database on a single connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let mut opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            opts = opts
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;

        tracing::debug!("opened sqlite vector store at {path}");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl VectorStore for SqliteVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = i64::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            sqlx::query("INSERT OR IGNORE INTO vector_collections (name, vector_size) VALUES (?, ?)")
                .bind(&collection)
                .bind(size)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let n: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM vector_collections WHERE name = ?")
                    .bind(&collection)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(n > 0)
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size: Option<i64> =
                sqlx::query_scalar("SELECT vector_size FROM vector_collections WHERE name = ?")
                    .bind(&collection)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let Some(size) = size else {
                return Err(VectorStoreError::Upsert(format!(
                    "collection {collection} not found"
                )));
            };

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            for p in points {
                if i64::try_from(p.vector.len()).ok() != Some(size) {
                    return Err(VectorStoreError::Upsert(format!(
                        "point {} has dimension {}, collection expects {size}",
                        p.id,
                        p.vector.len()
                    )));
                }
                let payload = serde_json::to_string(&p.payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO vector_points (collection, point_id, vector, payload) \
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT(collection, point_id) DO UPDATE SET \
                     vector = excluded.vector, payload = excluded.payload",
                )
                .bind(&collection)
                .bind(&p.id)
                .bind(encode_vector(&p.vector))
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            }
            tx.commit()
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
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
            let rows: Vec<(String, Vec<u8>, String)> = sqlx::query_as(
                "SELECT point_id, vector, payload FROM vector_points \
                 WHERE collection = ? ORDER BY seq ASC",
            )
            .bind(&collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let mut scored = Vec::with_capacity(rows.len());
            for (id, blob, payload) in rows {
                let payload: HashMap<String, serde_json::Value> = serde_json::from_str(&payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                if filter.as_ref().is_some_and(|f| !f.matches(&payload)) {
                    continue;
                }
                scored.push(ScoredVectorPoint {
                    id,
                    score: cosine_similarity(&vector, &decode_vector(&blob)),
                    payload,
                });
            }
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
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            for id in &ids {
                sqlx::query("DELETE FROM vector_points WHERE collection = ? AND point_id = ?")
                    .bind(&collection)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            }
            tx.commit()
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            Ok(())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_points WHERE collection = ?")
                .bind(&collection)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    fn point(id: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("title".into(), serde_json::json!(id))]),
        }
    }

    async fn store() -> SqliteVectorStore {
        let s = SqliteVectorStore::new(":memory:").await.unwrap();
        s.ensure_collection("papers", 2).await.unwrap();
        s
    }

    #[test]
    fn vector_blob_round_trip() {
        let v = vec![0.25_f32, -1.5, 3.0];
        assert_eq!(decode_vector(&encode_vector(&v)), v);
    }

    #[tokio::test]
    async fn wal_journal_mode_enabled_on_file_db() {
        let file = NamedTempFile::new().expect("tempfile");
        let path = file.path().to_str().expect("valid path");

        let store = SqliteVectorStore::new(path).await.expect("open");

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .expect("PRAGMA query");

        assert_eq!(mode, "wal", "expected WAL journal mode, got: {mode}");
    }

    #[tokio::test]
    async fn search_ranks_by_cosine() {
        let s = store().await;
        s.upsert(
            "papers",
            vec![point("far", vec![0.0, 1.0]), point("near", vec![1.0, 0.1])],
        )
        .await
        .unwrap();
        let hits = s.search("papers", vec![1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits[0].id, "near");
        assert_eq!(hits[0].payload["title"], "near");
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn overwrite_keeps_row_position() {
        let s = store().await;
        for id in ["a", "b", "c"] {
            s.upsert("papers", vec![point(id, vec![1.0, 1.0])]).await.unwrap();
        }
        s.upsert("papers", vec![point("a", vec![2.0, 2.0])]).await.unwrap();

        let hits = s.search("papers", vec![1.0, 1.0], 10, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(s.count("papers").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected_atomically() {
        let s = store().await;
        let err = s
            .upsert(
                "papers",
                vec![point("ok", vec![1.0, 0.0]), point("bad", vec![1.0, 0.0, 0.0])],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
        assert_eq!(s.count("papers").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_collection_behaviour() {
        let s = SqliteVectorStore::new(":memory:").await.unwrap();
        assert!(!s.collection_exists("papers").await.unwrap());
        assert_eq!(s.count("papers").await.unwrap(), 0);
        assert!(s.upsert("papers", vec![point("a", vec![1.0])]).await.is_err());
    }

    #[tokio::test]
    async fn delete_by_ids_and_filter() {
        let s = store().await;
        s.upsert(
            "papers",
            vec![point("a", vec![1.0, 0.0]), point("b", vec![1.0, 0.0])],
        )
        .await
        .unwrap();
        let only_b = s
            .search(
                "papers",
                vec![1.0, 0.0],
                10,
                Some(VectorFilter::must_equal("title", "b")),
            )
            .await
            .unwrap();
        assert_eq!(only_b.len(), 1);

        s.delete_by_ids("papers", vec!["a".into()]).await.unwrap();
        assert_eq!(s.count("papers").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        {
            let s = SqliteVectorStore::new(&path).await.unwrap();
            s.ensure_collection("papers", 2).await.unwrap();
            s.upsert("papers", vec![point("a", vec![1.0, 0.0])]).await.unwrap();
            s.pool().close().await;
        }
        let s = SqliteVectorStore::new(&path).await.unwrap();
        assert_eq!(s.count("papers").await.unwrap(), 1);
    }
}
