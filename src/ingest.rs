//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one file: validate → extract → classify →
//! chunk+embed → persist → relocate. Every attempt produces a
//! [`ProcessingResult`], success or failure — nothing raises past this
//! boundary, and batch ingestion keeps going past individual failures.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::classify;
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{self, FileFormat};
use crate::models::{DocumentMetadata, FileInfo, MetadataOverrides, ProcessingResult};
use crate::store::VectorStore;

pub struct Ingestor<'a> {
    store: &'a VectorStore,
    config: &'a Config,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a VectorStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Process a single file end to end. Never returns an error: failures are
    /// folded into the result record.
    pub async fn process_file(
        &self,
        path: &Path,
        collection: Option<&str>,
        overrides: MetadataOverrides,
    ) -> ProcessingResult {
        match self.process_file_inner(path, collection, overrides).await {
            Ok(result) => result,
            Err(e) => {
                error!(file = %path.display(), error = %e, "ingestion failed");
                ProcessingResult::failure(path.display().to_string(), e)
            }
        }
    }

    async fn process_file_inner(
        &self,
        path: &Path,
        collection: Option<&str>,
        overrides: MetadataOverrides,
    ) -> PipelineResult<ProcessingResult> {
        // Validate
        if !path.is_file() {
            return Err(PipelineError::Validation(format!(
                "file not found: {}",
                path.display()
            )));
        }
        let (file_info, format) = collect_file_info(path, self.config.ingest.max_file_size)?;

        // Extract
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::ExtractionFailed(format!("read failed: {}", e)))?;
        let content = extract::extract_text(format, &bytes)?;

        // Classify and merge: detected signals first, caller overrides win
        let category = classify::classify(&content, &file_info.filename);
        let signals = classify::extract_signals(&content);
        let mut metadata = DocumentMetadata {
            file: file_info,
            category,
            grade_level: None,
            subject: None,
            topics: Vec::new(),
            processed_at: Utc::now(),
            extra: BTreeMap::new(),
        };
        metadata.apply_overrides(signals.into_overrides());
        metadata.apply_overrides(overrides);

        // Persist. An explicit collection must already exist; the
        // category-derived default is created on demand.
        let target = match collection {
            Some(name) => {
                if !self.store.collection_exists(name).await? {
                    return Err(PipelineError::Persistence(format!(
                        "collection '{}' not found",
                        name
                    )));
                }
                name.to_string()
            }
            None => {
                let name = metadata.category.as_str();
                self.store.create_collection(name, "").await?;
                name.to_string()
            }
        };

        let added = self.store.add_document(&target, &content, &metadata).await?;

        // Relocate after the store commit; the store is the source of truth,
        // so a failed move only warns.
        if let Err(e) = self.move_to_processed(path, &metadata.file.file_extension) {
            warn!(file = %path.display(), error = %e, "could not move file to processed area");
        }

        info!(
            file = %path.display(),
            document_id = %added.document_id,
            collection = %target,
            chunks = added.chunks_created,
            "file ingested"
        );

        Ok(ProcessingResult {
            success: true,
            file_path: path.display().to_string(),
            document_id: Some(added.document_id),
            collection: Some(target),
            chunks_created: added.chunks_created,
            error: None,
        })
    }

    fn move_to_processed(&self, path: &Path, extension: &str) -> std::io::Result<()> {
        let subdir = extension.trim_start_matches('.');
        let target_dir = self.config.ingest.processed_dir.join(subdir);
        std::fs::create_dir_all(&target_dir)?;
        let filename = path.file_name().unwrap_or_default();
        std::fs::rename(path, target_dir.join(filename))
    }

    /// Process every supported file under a directory. Files fail
    /// independently; the batch never aborts and carries no ordering
    /// guarantee between files.
    pub async fn process_directory(
        &self,
        directory: &Path,
        recursive: bool,
    ) -> Vec<ProcessingResult> {
        let exclude = match build_globset(&self.config.ingest.exclude_globs) {
            Ok(set) => set,
            Err(e) => {
                return vec![ProcessingResult::failure(
                    directory.display().to_string(),
                    format!("invalid exclude glob: {}", e),
                )]
            }
        };

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut paths: Vec<PathBuf> = WalkDir::new(directory)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                let rel = path.strip_prefix(directory).unwrap_or(path);
                !exclude.is_match(rel)
            })
            .filter(|path| FileFormat::from_extension(&extension_of(path)).is_some())
            .collect();

        // deterministic processing order
        paths.sort();

        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let result = self
                .process_file(&path, None, MetadataOverrides::default())
                .await;
            results.push(result);
        }
        results
    }
}

/// Aggregated view over a batch of processing results.
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_chunks: usize,
    pub by_extension: BTreeMap<String, usize>,
    pub errors: Vec<(String, String)>,
}

pub fn processing_stats(results: &[ProcessingResult]) -> ProcessingStats {
    let mut stats = ProcessingStats {
        total_files: results.len(),
        ..Default::default()
    };

    for result in results {
        if result.success {
            stats.successful += 1;
            stats.total_chunks += result.chunks_created;
            let ext = extension_of(Path::new(&result.file_path));
            *stats.by_extension.entry(ext).or_insert(0) += 1;
        } else {
            stats.failed += 1;
            stats.errors.push((
                result.file_path.clone(),
                result.error.clone().unwrap_or_default(),
            ));
        }
    }

    stats
}

/// Collect file identity and timestamps; the content hash streams the file
/// in 4 KiB reads so large uploads never load twice.
fn collect_file_info(path: &Path, max_file_size: u64) -> PipelineResult<(FileInfo, FileFormat)> {
    let extension = extension_of(path);
    let format = FileFormat::from_extension(&extension)
        .ok_or_else(|| PipelineError::UnsupportedFormat(extension.clone()))?;

    let meta = std::fs::metadata(path)
        .map_err(|e| PipelineError::Validation(format!("cannot stat file: {}", e)))?;

    if meta.len() > max_file_size {
        return Err(PipelineError::Validation(format!(
            "file exceeds maximum size ({} > {} bytes)",
            meta.len(),
            max_file_size
        )));
    }

    let modified_at = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let created_at = meta
        .created()
        .map(DateTime::<Utc>::from)
        .unwrap_or(modified_at);

    let file_hash = hash_file(path)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok((
        FileInfo {
            filename,
            file_extension: extension,
            file_size: meta.len(),
            file_hash,
            format_label: format.label().to_string(),
            created_at,
            modified_at,
        },
        format,
    ))
}

fn hash_file(path: &Path) -> PipelineResult<String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| PipelineError::Validation(format!("cannot open file: {}", e)))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| PipelineError::Validation(format!("read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Lower-cased extension with its leading dot, or empty.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
