//! Persistent vector store over SQLite.
//!
//! Collections are named partitions; each chunk row carries its text, its
//! serialized metadata, and its embedding as a little-endian f32 BLOB. A
//! document's chunks are inserted inside a single transaction so concurrent
//! readers never observe a partially stored document.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::chunk;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingClient};
use crate::error::{PipelineError, PipelineResult};
use crate::migrate;
use crate::models::{ChunkMetadata, CollectionStats, DocumentMetadata, SearchHit};

/// Outcome of a successful `add_document` call.
#[derive(Debug, Clone)]
pub struct AddedDocument {
    pub document_id: String,
    pub chunks_created: usize,
    /// How many chunks were embedded by the fallback path.
    pub degraded_chunks: usize,
}

/// Aggregated view across all collections.
#[derive(Debug, Clone)]
pub struct StoreInfo {
    pub collections: Vec<CollectionStats>,
    pub total_documents: i64,
    pub total_chunks: i64,
}

pub struct VectorStore {
    pool: SqlitePool,
    embedder: EmbeddingClient,
    chunk_size: usize,
    overlap: usize,
}

impl VectorStore {
    /// Open (or create) the store and ensure schema and default collections
    /// exist. Failure here is unrecoverable and aborts initialization.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.store.path).await?;
        migrate::run_migrations(&pool).await?;
        migrate::seed_default_collections(&pool).await?;

        let embedder = EmbeddingClient::new(&config.embedding)?;

        Ok(Self {
            pool,
            embedder,
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn embedder(&self) -> &EmbeddingClient {
        &self.embedder
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Create a collection if it does not already exist. Idempotent.
    pub async fn create_collection(&self, name: &str, description: &str) -> PipelineResult<()> {
        if name.trim().is_empty() {
            return Err(PipelineError::Validation(
                "collection name must not be empty".to_string(),
            ));
        }
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO collections (name, description, created_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        Ok(())
    }

    pub async fn collection_exists(&self, name: &str) -> PipelineResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        Ok(exists)
    }

    pub async fn list_collections(&self) -> PipelineResult<Vec<CollectionStats>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        let mut all = Vec::with_capacity(names.len());
        for name in names {
            all.push(self.stats(&name).await?);
        }
        Ok(all)
    }

    /// Chunk, embed, and persist one document as a single atomic batch.
    /// Either every chunk of the document is stored or none are.
    pub async fn add_document(
        &self,
        collection: &str,
        text: &str,
        metadata: &DocumentMetadata,
    ) -> PipelineResult<AddedDocument> {
        if !self.collection_exists(collection).await? {
            return Err(PipelineError::Persistence(format!(
                "collection '{}' not found",
                collection
            )));
        }

        let ingested_at = Utc::now();
        let document_id = chunk::document_id(text, ingested_at);
        let chunks = chunk::build_chunks(&document_id, text, self.chunk_size, self.overlap);

        if chunks.is_empty() {
            return Err(PipelineError::Validation(
                "document has no content to store".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let outcomes = self.embedder.embed_batch(&texts).await;
        let degraded_chunks = outcomes.iter().filter(|o| o.degraded).count();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        for (chunk, outcome) in chunks.iter().zip(outcomes.iter()) {
            let chunk_meta = ChunkMetadata {
                document: metadata.clone(),
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks,
                added_at: ingested_at,
                embedding_degraded: outcome.degraded,
            };
            let metadata_json = serde_json::to_string(&chunk_meta)
                .map_err(|e| PipelineError::Persistence(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO chunks
                    (id, collection, document_id, chunk_index, total_chunks,
                     text, metadata_json, embedding, degraded, added_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(collection)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index as i64)
            .bind(chunk.total_chunks as i64)
            .bind(&chunk.text)
            .bind(&metadata_json)
            .bind(embedding::vec_to_blob(&outcome.vector))
            .bind(outcome.degraded as i64)
            .bind(ingested_at.timestamp())
            .execute(&mut *tx)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        info!(
            document_id = %document_id,
            collection = %collection,
            chunks = chunks.len(),
            degraded = degraded_chunks,
            "document stored"
        );

        Ok(AddedDocument {
            document_id,
            chunks_created: chunks.len(),
            degraded_chunks,
        })
    }

    /// Embed the query and return the k nearest chunks by ascending cosine
    /// distance, ties broken by insertion order.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> PipelineResult<Vec<SearchHit>> {
        let outcome = self.embedder.embed(query).await;
        self.search_with_vector(collection, &outcome.vector, k).await
    }

    /// Nearest-neighbor lookup against a pre-computed query vector.
    pub async fn search_with_vector(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
    ) -> PipelineResult<Vec<SearchHit>> {
        if !self.collection_exists(collection).await? {
            return Err(PipelineError::Persistence(format!(
                "collection '{}' not found",
                collection
            )));
        }

        let rows = sqlx::query(
            r#"
            SELECT rowid, id, document_id, text, metadata_json, embedding
            FROM chunks
            WHERE collection = ?
            ORDER BY rowid
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        let mut candidates: Vec<(f64, i64, SearchHit)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = embedding::blob_to_vec(&blob);
            let distance = embedding::cosine_distance(query_vector, &vector);
            let metadata_json: String = row.get("metadata_json");
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                .map_err(|e| PipelineError::Persistence(e.to_string()))?;
            let rowid: i64 = row.get("rowid");

            candidates.push((
                distance,
                rowid,
                SearchHit {
                    chunk_id: row.get("id"),
                    document_id: row.get("document_id"),
                    text: row.get("text"),
                    metadata,
                    distance,
                },
            ));
        }

        // ascending distance, insertion order breaks ties
        candidates.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        candidates.truncate(k);

        Ok(candidates.into_iter().map(|(_, _, hit)| hit).collect())
    }

    pub async fn stats(&self, collection: &str) -> PipelineResult<CollectionStats> {
        let row = sqlx::query("SELECT description, created_at FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?
            .ok_or_else(|| {
                PipelineError::Persistence(format!("collection '{}' not found", collection))
            })?;

        let description: String = row.get("description");
        let created_ts: i64 = row.get("created_at");

        let document_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT document_id) FROM chunks WHERE collection = ?",
        )
        .bind(collection)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        let chunk_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        Ok(CollectionStats {
            name: collection.to_string(),
            description,
            created_at: timestamp_to_datetime(created_ts),
            document_count,
            chunk_count,
        })
    }

    /// Aggregate stats across every collection.
    pub async fn info(&self) -> PipelineResult<StoreInfo> {
        let collections = self.list_collections().await?;
        let total_documents = collections.iter().map(|c| c.document_count).sum();
        let total_chunks = collections.iter().map(|c| c.chunk_count).sum();
        Ok(StoreInfo {
            collections,
            total_documents,
            total_chunks,
        })
    }

    /// Delete a collection and all of its chunks. Permanent and irreversible;
    /// returns the pre-deletion stats so callers can report what was removed.
    pub async fn delete_collection(&self, name: &str) -> PipelineResult<CollectionStats> {
        let stats = self.stats(name).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        info!(collection = %name, chunks_deleted = stats.chunk_count, "collection deleted");
        Ok(stats)
    }
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}
