//! Core data types used throughout classvault.
//!
//! These types represent the files, metadata, chunks, and results that flow
//! through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse educational content category. Closed set; doubles as the default
/// collection name for category-routed ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    LessonPlan,
    Assessment,
    StudentWork,
    ParentCommunication,
    Curriculum,
    /// Generic fallback when no category rule matches.
    #[serde(rename = "educational_content")]
    General,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::LessonPlan => "lesson_plan",
            ContentCategory::Assessment => "assessment",
            ContentCategory::StudentWork => "student_work",
            ContentCategory::ParentCommunication => "parent_communication",
            ContentCategory::Curriculum => "curriculum",
            ContentCategory::General => "educational_content",
        }
    }

    /// All categories, used to seed the default collections at init.
    pub fn all() -> &'static [ContentCategory] {
        &[
            ContentCategory::General,
            ContentCategory::LessonPlan,
            ContentCategory::Assessment,
            ContentCategory::StudentWork,
            ContentCategory::ParentCommunication,
            ContentCategory::Curriculum,
        ]
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic information about a source file, collected at validation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub file_extension: String,
    pub file_size: u64,
    /// SHA-256 of the full byte content; content identity, not the filename.
    pub file_hash: String,
    pub format_label: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Structured metadata attached to an ingested document.
///
/// Optional fields are omitted from the serialized form when absent rather
/// than serialized as null, so downstream consumers can distinguish
/// "not detected" from "detected empty".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(flatten)]
    pub file: FileInfo,
    pub category: ContentCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    pub processed_at: DateTime<Utc>,
    /// Caller-supplied custom metadata, free-form.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl DocumentMetadata {
    /// Merge caller-supplied overrides into this metadata. Override fields
    /// win on conflict; absent override fields leave the detected values.
    pub fn apply_overrides(&mut self, overrides: MetadataOverrides) {
        if let Some(category) = overrides.category {
            self.category = category;
        }
        if let Some(grade_level) = overrides.grade_level {
            self.grade_level = Some(grade_level);
        }
        if let Some(subject) = overrides.subject {
            self.subject = Some(subject);
        }
        if let Some(topics) = overrides.topics {
            self.topics = topics;
        }
        self.extra.extend(overrides.extra);
    }
}

/// All-optional mirror of the classifier-controlled metadata fields.
/// Everything present here replaces the detected value.
#[derive(Debug, Clone, Default)]
pub struct MetadataOverrides {
    pub category: Option<ContentCategory>,
    pub grade_level: Option<String>,
    pub subject: Option<String>,
    pub topics: Option<Vec<String>>,
    pub extra: BTreeMap<String, String>,
}

/// An ordered slice of a document's extracted text; the unit of embedding
/// and retrieval. Immutable once created.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// `{document_id}_chunk_{index}`.
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub text: String,
}

/// Per-chunk metadata persisted next to the embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub added_at: DateTime<Utc>,
    /// True when the vector came from the deterministic fallback rather than
    /// the embedding service; lets operators tell degraded vectors apart.
    #[serde(default)]
    pub embedding_degraded: bool,
}

/// Outcome record for one ingestion attempt. Always produced, success or not.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub success: bool,
    pub file_path: String,
    pub document_id: Option<String>,
    pub collection: Option<String>,
    pub chunks_created: usize,
    pub error: Option<String>,
}

impl ProcessingResult {
    pub fn failure(file_path: impl Into<String>, error: impl fmt::Display) -> Self {
        ProcessingResult {
            success: false,
            file_path: file_path.into(),
            document_id: None,
            collection: None,
            chunks_created: 0,
            error: Some(error.to_string()),
        }
    }
}

/// A ranked search hit: chunk text, its metadata, and the distance to the
/// query vector (smaller = more relevant).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f64,
}

/// Statistics for one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Distinct document ids stored in the collection.
    pub document_count: i64,
    /// Stored chunk records (what the index actually holds).
    pub chunk_count: i64,
}

/// Manifest written next to every backup; makes the artifact self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_name: String,
    pub created_at: DateTime<Utc>,
    pub original_path: String,
    pub collections: Vec<String>,
    pub stats: Vec<CollectionStats>,
}
