//! End-to-end pipeline tests.
//!
//! The embedding URL points at a closed local port, so every embedding comes
//! from the deterministic fallback and the whole suite runs offline.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tempfile::TempDir;

use classvault::backup;
use classvault::chunk::chunk_words;
use classvault::config::{ChunkingConfig, Config, EmbeddingConfig, IngestConfig, StoreConfig};
use classvault::embedding::vec_to_blob;
use classvault::error::PipelineError;
use classvault::ingest::Ingestor;
use classvault::models::{
    ChunkMetadata, ContentCategory, DocumentMetadata, FileInfo, MetadataOverrides,
};
use classvault::store::VectorStore;

const LESSON_PLAN: &str = "\
Lesson Plan: Introduction to Fractions
Grade Level: 4th Grade
Subject: Mathematics

Objective: Students will understand what fractions represent and identify
fractions in everyday life.

Activities:
1. Introduction: Discuss what students know about fractions
2. Demonstration: Use pizza cutouts to show 1/2, 1/4, 1/8
3. Practice: Students work with fraction circles
";

fn test_config(root: &std::path::Path) -> Config {
    Config {
        store: StoreConfig {
            path: root.join("data/vault.db"),
            backup_dir: root.join("backups"),
        },
        chunking: ChunkingConfig {
            chunk_size: 1000,
            overlap: 200,
        },
        embedding: EmbeddingConfig {
            // closed port: connection refused immediately, fallback engages
            ollama_url: "http://127.0.0.1:1".to_string(),
            model: "nomic-embed-text".to_string(),
            dims: 384,
            timeout_secs: 2,
            concurrency: 4,
        },
        ingest: IngestConfig {
            upload_dir: root.join("uploads"),
            processed_dir: root.join("processed"),
            max_file_size: 50 * 1024 * 1024,
            exclude_globs: Vec::new(),
        },
    }
}

fn write_upload(config: &Config, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(&config.ingest.upload_dir).unwrap();
    let path = config.ingest.upload_dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn sample_chunk_metadata(doc_id: &str, index: usize, total: usize) -> ChunkMetadata {
    ChunkMetadata {
        document: DocumentMetadata {
            file: FileInfo {
                filename: format!("{}.txt", doc_id),
                file_extension: ".txt".to_string(),
                file_size: 1,
                file_hash: "0".repeat(64),
                format_label: "Text File".to_string(),
                created_at: Utc::now(),
                modified_at: Utc::now(),
            },
            category: ContentCategory::General,
            grade_level: None,
            subject: None,
            topics: Vec::new(),
            processed_at: Utc::now(),
            extra: BTreeMap::new(),
        },
        chunk_index: index,
        total_chunks: total,
        added_at: Utc::now(),
        embedding_degraded: true,
    }
}

/// Insert a chunk row with a handcrafted embedding, bypassing the embedder.
async fn insert_raw_chunk(
    store: &VectorStore,
    collection: &str,
    doc_id: &str,
    index: usize,
    vector: &[f32],
) {
    let meta = sample_chunk_metadata(doc_id, index, 1);
    let metadata_json = serde_json::to_string(&meta).unwrap();
    sqlx::query(
        r#"
        INSERT INTO chunks
            (id, collection, document_id, chunk_index, total_chunks,
             text, metadata_json, embedding, degraded, added_at)
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(format!("{}_chunk_{}", doc_id, index))
    .bind(collection)
    .bind(doc_id)
    .bind(index as i64)
    .bind(format!("text of {}", doc_id))
    .bind(metadata_json)
    .bind(vec_to_blob(vector))
    .bind(Utc::now().timestamp())
    .execute(store.pool())
    .await
    .unwrap();
}

#[tokio::test]
async fn end_to_end_lesson_plan_ingestion() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    let path = write_upload(&config, "sample_lesson.txt", LESSON_PLAN);
    let result = ingestor
        .process_file(&path, None, MetadataOverrides::default())
        .await;

    assert!(result.success, "ingestion failed: {:?}", result.error);
    let doc_id = result.document_id.expect("document id");
    assert!(!doc_id.is_empty());
    // content is under 1000 words: exactly one chunk
    assert_eq!(result.chunks_created, 1);
    // keyword priority routes to the lesson_plan collection
    assert_eq!(result.collection.as_deref(), Some("lesson_plan"));

    let hits = store.search("lesson_plan", "fractions", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    let meta = &hits[0].metadata;
    assert_eq!(meta.document.category, ContentCategory::LessonPlan);
    assert_eq!(meta.document.grade_level.as_deref(), Some("4th grade"));
    assert_eq!(meta.document.subject.as_deref(), Some("mathematics"));
    assert_eq!(meta.document.topics, vec!["fractions".to_string()]);
    // offline run: the fallback produced the vector and flagged it
    assert!(meta.embedding_degraded);

    // the source file moved into the processed area, partitioned by extension
    assert!(!path.exists());
    assert!(config
        .ingest
        .processed_dir
        .join("txt/sample_lesson.txt")
        .exists());

    store.close().await;
}

#[tokio::test]
async fn unsupported_format_is_rejected_without_touching_store() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    let path = write_upload(&config, "virus.exe", "MZ payload");
    let result = ingestor
        .process_file(&path, None, MetadataOverrides::default())
        .await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or("").contains(".exe"));

    let info = store.info().await.unwrap();
    assert_eq!(info.total_chunks, 0);
    // rejected files stay where they were
    assert!(path.exists());

    store.close().await;
}

#[tokio::test]
async fn empty_file_fails_with_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    let path = write_upload(&config, "empty.txt", "   \n\t  ");
    let result = ingestor
        .process_file(&path, None, MetadataOverrides::default())
        .await;

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap_or("")
        .contains("extraction failed"));

    store.close().await;
}

#[tokio::test]
async fn missing_file_fails_validation() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    let result = ingestor
        .process_file(
            &config.ingest.upload_dir.join("nope.txt"),
            None,
            MetadataOverrides::default(),
        )
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or("").contains("not found"));

    store.close().await;
}

#[tokio::test]
async fn explicit_collection_must_exist() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    let path = write_upload(&config, "note.txt", "a perfectly ordinary note");
    let result = ingestor
        .process_file(&path, Some("does_not_exist"), MetadataOverrides::default())
        .await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or("").contains("not found"));
    assert_eq!(store.info().await.unwrap().total_chunks, 0);

    store.close().await;
}

#[tokio::test]
async fn add_document_to_missing_collection_leaves_no_rows() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();

    let meta = sample_chunk_metadata("x", 0, 1).document;
    let err = store
        .add_document("ghost", "some text", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Persistence(_)));
    assert_eq!(store.info().await.unwrap().total_chunks, 0);

    store.close().await;
}

#[tokio::test]
async fn caller_overrides_win_over_detected_metadata() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    let path = write_upload(&config, "quiz.txt", "Quiz on fractions for 3rd grade math");
    let mut extra = BTreeMap::new();
    extra.insert("teacher".to_string(), "M. Okafor".to_string());
    let result = ingestor
        .process_file(
            &path,
            None,
            MetadataOverrides {
                category: None,
                grade_level: Some("5th grade".to_string()),
                subject: None,
                topics: None,
                extra,
            },
        )
        .await;
    assert!(result.success);

    let hits = store.search("assessment", "fractions", 1).await.unwrap();
    let meta = &hits[0].metadata.document;
    // override replaced the detected "3rd grade"
    assert_eq!(meta.grade_level.as_deref(), Some("5th grade"));
    // detection kept where no override was given
    assert_eq!(meta.subject.as_deref(), Some("math"));
    assert_eq!(meta.extra.get("teacher").map(String::as_str), Some("M. Okafor"));

    store.close().await;
}

#[tokio::test]
async fn search_ranks_by_ascending_distance() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    store.create_collection("ranking", "").await.unwrap();

    // 2-d unit vectors at chosen angles from the query [1, 0]:
    // cosine similarity s gives distance 1 - s.
    let query = [1.0f32, 0.0];
    let for_distance = |d: f32| {
        let s = 1.0 - d;
        [s, (1.0 - s * s).sqrt()]
    };

    insert_raw_chunk(&store, "ranking", "doc_mid", 0, &for_distance(0.5)).await;
    insert_raw_chunk(&store, "ranking", "doc_near", 0, &for_distance(0.1)).await;
    insert_raw_chunk(&store, "ranking", "doc_far", 0, &for_distance(0.9)).await;

    let hits = store.search_with_vector("ranking", &query, 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document_id, "doc_near");
    assert_eq!(hits[1].document_id, "doc_mid");
    assert!((hits[0].distance - 0.1).abs() < 1e-3, "{}", hits[0].distance);
    assert!((hits[1].distance - 0.5).abs() < 1e-3, "{}", hits[1].distance);

    store.close().await;
}

#[tokio::test]
async fn search_breaks_distance_ties_by_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    store.create_collection("ties", "").await.unwrap();

    let same = [0.6f32, 0.8];
    insert_raw_chunk(&store, "ties", "doc_first", 0, &same).await;
    insert_raw_chunk(&store, "ties", "doc_second", 0, &same).await;

    let hits = store
        .search_with_vector("ties", &[1.0, 0.0], 2)
        .await
        .unwrap();
    assert_eq!(hits[0].document_id, "doc_first");
    assert_eq!(hits[1].document_id, "doc_second");

    store.close().await;
}

#[tokio::test]
async fn concurrent_reader_never_sees_partial_document() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    // many small chunks so the insert batch is non-trivial
    config.chunking.chunk_size = 20;
    config.chunking.overlap = 5;

    let store = std::sync::Arc::new(VectorStore::open(&config).await.unwrap());
    store.create_collection("atomic", "").await.unwrap();

    let text = (0..2000).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
    let expected = chunk_words(&text, 20, 5).len() as i64;
    assert!(expected > 50);

    let meta = sample_chunk_metadata("atomic", 0, 1).document;
    let writer = {
        let store = store.clone();
        let text = text.clone();
        tokio::spawn(async move { store.add_document("atomic", &text, &meta).await })
    };

    // poll until the writer finishes; every observation must be all-or-nothing
    let mut observations = Vec::new();
    loop {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = 'atomic'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        observations.push(count);
        if writer.is_finished() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    let added = writer.await.unwrap().unwrap();
    assert_eq!(added.chunks_created as i64, expected);
    for count in observations {
        assert!(
            count == 0 || count == expected,
            "observed partially inserted document: {} of {}",
            count,
            expected
        );
    }
}

#[tokio::test]
async fn directory_ingestion_isolates_failures_and_skips_unsupported() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    write_upload(&config, "lesson.txt", LESSON_PLAN);
    write_upload(&config, "empty.md", "   ");
    write_upload(&config, "tool.exe", "MZ");

    let results = ingestor
        .process_directory(&config.ingest.upload_dir, true)
        .await;

    // .exe is filtered out of directory scans entirely
    assert_eq!(results.len(), 2);
    let ok = results.iter().filter(|r| r.success).count();
    let failed = results.iter().filter(|r| !r.success).count();
    assert_eq!(ok, 1);
    assert_eq!(failed, 1);

    store.close().await;
}

#[tokio::test]
async fn backup_and_restore_round_trip() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    let path = write_upload(&config, "lesson.txt", LESSON_PLAN);
    let result = ingestor
        .process_file(&path, None, MetadataOverrides::default())
        .await;
    assert!(result.success);

    let backup_path = backup::backup_database(&store, &config, Some("snap1".to_string()))
        .await
        .unwrap();
    assert!(backup_path.join("backup_manifest.json").exists());

    // destructive change after the backup
    store.delete_collection("lesson_plan").await.unwrap();
    assert!(store.stats("lesson_plan").await.is_err());
    store.close().await;

    let manifest = backup::restore_database(&config, &backup_path).unwrap();
    assert_eq!(manifest.backup_name, "snap1");
    assert!(manifest.collections.contains(&"lesson_plan".to_string()));

    let store = VectorStore::open(&config).await.unwrap();
    let stats = store.stats("lesson_plan").await.unwrap();
    assert_eq!(stats.document_count, 1);

    let listed = backup::list_backups(&config).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].backup_name, "snap1");

    store.close().await;
}

#[tokio::test]
async fn stats_report_documents_and_chunks() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = VectorStore::open(&config).await.unwrap();
    let ingestor = Ingestor::new(&store, &config);

    write_upload(&config, "a.txt", "Parent progress report for the guardian.");
    write_upload(&config, "b.txt", "Second progress report communication.");
    let r1 = ingestor
        .process_file(
            &config.ingest.upload_dir.join("a.txt"),
            None,
            MetadataOverrides::default(),
        )
        .await;
    let r2 = ingestor
        .process_file(
            &config.ingest.upload_dir.join("b.txt"),
            None,
            MetadataOverrides::default(),
        )
        .await;
    assert!(r1.success && r2.success);

    let stats = store.stats("parent_communication").await.unwrap();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.chunk_count, 2);

    store.close().await;
}
