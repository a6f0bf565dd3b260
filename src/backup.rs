//! Backup and restore for the vector store.
//!
//! A backup is a directory holding a consistent copy of the store database
//! (taken with `VACUUM INTO`, so live writers are not disturbed) plus a JSON
//! manifest enumerating collections and counts, making the artifact
//! self-describing. Restore is the inverse bulk copy; it replaces the current
//! store file, so it runs before the store is opened.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::models::BackupManifest;
use crate::store::VectorStore;

/// File name of the database copy inside a backup directory.
const BACKUP_DB_FILE: &str = "store.db";
/// File name of the manifest inside a backup directory.
const MANIFEST_FILE: &str = "backup_manifest.json";

/// Create a backup under the configured backup directory and return its path.
pub async fn backup_database(
    store: &VectorStore,
    config: &Config,
    name: Option<String>,
) -> Result<PathBuf> {
    let backup_name =
        name.unwrap_or_else(|| format!("backup_{}", Utc::now().format("%Y%m%d_%H%M%S")));
    let backup_path = config.store.backup_dir.join(&backup_name);

    if backup_path.exists() {
        bail!("backup '{}' already exists", backup_name);
    }
    std::fs::create_dir_all(&backup_path)
        .with_context(|| format!("cannot create backup directory {}", backup_path.display()))?;

    // VACUUM INTO produces a consistent snapshot without closing the pool
    let db_copy = backup_path.join(BACKUP_DB_FILE);
    let target = db_copy.display().to_string().replace('\'', "''");
    sqlx::query(&format!("VACUUM INTO '{}'", target))
        .execute(store.pool())
        .await
        .context("VACUUM INTO failed")?;

    let info = store.info().await?;
    let manifest = BackupManifest {
        backup_name: backup_name.clone(),
        created_at: Utc::now(),
        original_path: config.store.path.display().to_string(),
        collections: info.collections.iter().map(|c| c.name.clone()).collect(),
        stats: info.collections,
    };

    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(backup_path.join(MANIFEST_FILE), manifest_json)?;

    info!(backup = %backup_path.display(), "backup created");
    Ok(backup_path)
}

/// Replace the store database with a backup copy. Must run while the store
/// is closed; the caller reopens (and re-migrates) afterwards.
pub fn restore_database(config: &Config, backup_path: &Path) -> Result<BackupManifest> {
    if !backup_path.is_dir() {
        bail!("backup path does not exist: {}", backup_path.display());
    }
    let db_copy = backup_path.join(BACKUP_DB_FILE);
    if !db_copy.is_file() {
        bail!("backup is missing its database copy: {}", db_copy.display());
    }

    let manifest = read_manifest(backup_path)
        .with_context(|| format!("backup manifest unreadable in {}", backup_path.display()))?;

    if let Some(parent) = config.store.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(&db_copy, &config.store.path)?;

    // stale WAL/SHM files from the replaced database must not shadow the restored copy
    for suffix in ["-wal", "-shm"] {
        let side_file = PathBuf::from(format!("{}{}", config.store.path.display(), suffix));
        if side_file.exists() {
            let _ = std::fs::remove_file(side_file);
        }
    }

    info!(backup = %backup_path.display(), "store restored from backup");
    Ok(manifest)
}

/// List all backups, newest first. Directories without a manifest still show
/// up, described from filesystem metadata.
pub fn list_backups(config: &Config) -> Result<Vec<BackupManifest>> {
    let mut backups = Vec::new();
    let backup_dir = &config.store.backup_dir;

    if !backup_dir.is_dir() {
        return Ok(backups);
    }

    for entry in std::fs::read_dir(backup_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        match read_manifest(&path) {
            Ok(manifest) => backups.push(manifest),
            Err(_) => {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .map(chrono::DateTime::from)
                    .unwrap_or_else(|_| Utc::now());
                backups.push(BackupManifest {
                    backup_name: entry.file_name().to_string_lossy().to_string(),
                    created_at: modified,
                    original_path: String::new(),
                    collections: Vec::new(),
                    stats: Vec::new(),
                });
            }
        }
    }

    backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(backups)
}

fn read_manifest(backup_path: &Path) -> Result<BackupManifest> {
    let content = std::fs::read_to_string(backup_path.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&content)?)
}
