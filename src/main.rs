//! # classvault CLI (`cvault`)
//!
//! The `cvault` binary is the primary interface for classvault. It provides
//! commands for store initialization, document ingestion, similarity search,
//! collection administration, and backup management.
//!
//! ## Usage
//!
//! ```bash
//! cvault --config ./config/cvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cvault init` | Create the store, schema, default collections, and work directories |
//! | `cvault ingest <path>` | Ingest a file or directory into the vector store |
//! | `cvault search "<query>"` | Rank stored chunks by similarity to a query |
//! | `cvault stats [collection]` | Show collection statistics |
//! | `cvault info` | Show store-wide info and embedding service health |
//! | `cvault collections <list\|create\|delete>` | Administer collections |
//! | `cvault backup` | Create a self-describing backup |
//! | `cvault restore <path>` | Replace the store with a backup copy |
//! | `cvault backups` | List available backups, newest first |

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use classvault::backup;
use classvault::config::{load_config, Config};
use classvault::extract::FileFormat;
use classvault::ingest::{processing_stats, Ingestor};
use classvault::models::{MetadataOverrides, ProcessingResult};
use classvault::store::VectorStore;

/// classvault — a local-first ingestion and retrieval engine for
/// educational documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cvault",
    about = "classvault — a local-first ingestion and retrieval engine for educational documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store: schema, default collections, work directories.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Ingest a file or a directory of files.
    ///
    /// Directories are filtered to supported extensions; each file succeeds
    /// or fails independently. Successfully ingested files move to the
    /// processed area, partitioned by extension.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Target collection. Defaults to the detected content category.
        #[arg(long)]
        collection: Option<String>,

        /// Recurse into subdirectories (directory ingestion only).
        #[arg(long)]
        recursive: bool,

        /// Override the detected grade level.
        #[arg(long)]
        grade_level: Option<String>,

        /// Override the detected subject.
        #[arg(long)]
        subject: Option<String>,

        /// Custom metadata as key=value; repeatable.
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Search a collection for the chunks nearest to a query.
    Search {
        /// Query text.
        query: String,

        /// Collection to search.
        #[arg(long, default_value = "educational_content")]
        collection: String,

        /// Number of results to return.
        #[arg(short = 'k', long, default_value_t = 5)]
        limit: usize,
    },

    /// Show statistics for one collection, or all collections.
    Stats {
        /// Collection name; omit for all collections.
        collection: Option<String>,
    },

    /// Show store-wide information and embedding service health.
    Info,

    /// Administer collections.
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },

    /// Create a backup of the store.
    Backup {
        /// Backup name; defaults to a timestamped name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Restore the store from a backup directory. Replaces current data.
    Restore {
        /// Path to a backup directory created by `cvault backup`.
        path: PathBuf,
    },

    /// List available backups, newest first.
    Backups,
}

#[derive(Subcommand)]
enum CollectionsAction {
    /// List collections with document and chunk counts.
    List,
    /// Create a collection (no-op if it already exists).
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a collection and all of its chunks. Permanent.
    Delete {
        name: String,
        /// Required confirmation; deletion is irreversible.
        #[arg(long)]
        yes: bool,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Ingest {
            path,
            collection,
            recursive,
            grade_level,
            subject,
            meta,
        } => {
            run_ingest(
                &config,
                &path,
                collection.as_deref(),
                recursive,
                grade_level,
                subject,
                meta,
            )
            .await
        }
        Commands::Search {
            query,
            collection,
            limit,
        } => run_search(&config, &query, &collection, limit).await,
        Commands::Stats { collection } => run_stats(&config, collection.as_deref()).await,
        Commands::Info => run_info(&config).await,
        Commands::Collections { action } => run_collections(&config, action).await,
        Commands::Backup { name } => run_backup(&config, name).await,
        Commands::Restore { path } => run_restore(&config, &path).await,
        Commands::Backups => run_backups(&config),
    }
}

async fn run_init(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.ingest.upload_dir)?;
    std::fs::create_dir_all(&config.ingest.processed_dir)?;
    std::fs::create_dir_all(&config.store.backup_dir)?;

    let store = VectorStore::open(config).await?;
    let info = store.info().await?;

    println!("init");
    println!("  store: {}", config.store.path.display());
    println!("  collections: {}", info.collections.len());
    println!(
        "  supported formats: {}",
        FileFormat::extensions().join(", ")
    );
    println!("ok");

    store.close().await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_ingest(
    config: &Config,
    path: &std::path::Path,
    collection: Option<&str>,
    recursive: bool,
    grade_level: Option<String>,
    subject: Option<String>,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let store = VectorStore::open(config).await?;
    let ingestor = Ingestor::new(&store, config);

    let overrides = MetadataOverrides {
        category: None,
        grade_level,
        subject,
        topics: None,
        extra: meta.into_iter().collect::<BTreeMap<_, _>>(),
    };

    let results: Vec<ProcessingResult> = if path.is_dir() {
        ingestor.process_directory(path, recursive).await
    } else {
        vec![ingestor.process_file(path, collection, overrides).await]
    };

    let stats = processing_stats(&results);
    println!("ingest {}", path.display());
    println!("  total files: {}", stats.total_files);
    println!("  successful:  {}", stats.successful);
    println!("  failed:      {}", stats.failed);
    println!("  chunks:      {}", stats.total_chunks);
    for result in results.iter().filter(|r| r.success) {
        println!(
            "  + {} -> {} ({} chunks, {})",
            result.file_path,
            result.document_id.as_deref().unwrap_or("?"),
            result.chunks_created,
            result.collection.as_deref().unwrap_or("?"),
        );
    }
    for (file, error) in &stats.errors {
        println!("  ! {}: {}", file, error);
    }
    println!("ok");

    store.close().await;
    Ok(())
}

async fn run_search(config: &Config, query: &str, collection: &str, limit: usize) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let store = VectorStore::open(config).await?;
    let hits = store.search(collection, query, limit).await?;

    if hits.is_empty() {
        println!("No results.");
        store.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let snippet: String = hit.text.chars().take(240).collect();
        println!(
            "{}. [{:.4}] {} / chunk {} of {}",
            i + 1,
            hit.distance,
            hit.document_id,
            hit.metadata.chunk_index + 1,
            hit.metadata.total_chunks
        );
        println!("    file: {}", hit.metadata.document.file.filename);
        if let Some(grade) = &hit.metadata.document.grade_level {
            println!("    grade: {}", grade);
        }
        if let Some(subject) = &hit.metadata.document.subject {
            println!("    subject: {}", subject);
        }
        if hit.metadata.embedding_degraded {
            println!("    note: fallback embedding (degraded)");
        }
        println!("    excerpt: \"{}\"", snippet.replace('\n', " "));
        println!();
    }

    store.close().await;
    Ok(())
}

async fn run_stats(config: &Config, collection: Option<&str>) -> Result<()> {
    let store = VectorStore::open(config).await?;

    match collection {
        Some(name) => {
            let stats = store.stats(name).await?;
            println!("collection {}", stats.name);
            println!("  description: {}", stats.description);
            println!("  created:     {}", stats.created_at.format("%Y-%m-%d %H:%M"));
            println!("  documents:   {}", stats.document_count);
            println!("  chunks:      {}", stats.chunk_count);
        }
        None => {
            let info = store.info().await?;
            println!(
                "  {:<24} {:>10} {:>8}",
                "COLLECTION", "DOCUMENTS", "CHUNKS"
            );
            println!("  {}", "-".repeat(46));
            for c in &info.collections {
                println!(
                    "  {:<24} {:>10} {:>8}",
                    c.name, c.document_count, c.chunk_count
                );
            }
            println!();
            println!("  total documents: {}", info.total_documents);
            println!("  total chunks:    {}", info.total_chunks);
        }
    }

    store.close().await;
    Ok(())
}

async fn run_info(config: &Config) -> Result<()> {
    let store = VectorStore::open(config).await?;
    let info = store.info().await?;
    let service_up = store.embedder().probe().await;

    let db_size = std::fs::metadata(&config.store.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("classvault — Store Info");
    println!("=======================");
    println!();
    println!("  store:            {}", config.store.path.display());
    println!("  size:             {}", format_bytes(db_size));
    println!("  collections:      {}", info.collections.len());
    println!("  total documents:  {}", info.total_documents);
    println!("  total chunks:     {}", info.total_chunks);
    println!(
        "  embedding model:  {} ({})",
        store.embedder().model_name(),
        config.embedding.ollama_url
    );
    println!(
        "  embedding service: {}",
        if service_up {
            "reachable"
        } else {
            "unreachable (fallback embeddings in use)"
        }
    );

    store.close().await;
    Ok(())
}

async fn run_collections(config: &Config, action: CollectionsAction) -> Result<()> {
    let store = VectorStore::open(config).await?;

    match action {
        CollectionsAction::List => {
            for c in store.list_collections().await? {
                println!(
                    "{}  ({} documents, {} chunks) — {}",
                    c.name, c.document_count, c.chunk_count, c.description
                );
            }
        }
        CollectionsAction::Create { name, description } => {
            store.create_collection(&name, &description).await?;
            println!("collection '{}' ready", name);
        }
        CollectionsAction::Delete { name, yes } => {
            if !yes {
                store.close().await;
                bail!("deleting a collection is permanent; re-run with --yes to confirm");
            }
            let stats = store.delete_collection(&name).await?;
            println!(
                "collection '{}' deleted ({} documents, {} chunks removed)",
                name, stats.document_count, stats.chunk_count
            );
        }
    }

    store.close().await;
    Ok(())
}

async fn run_backup(config: &Config, name: Option<String>) -> Result<()> {
    let store = VectorStore::open(config).await?;
    let path = backup::backup_database(&store, config, name).await?;
    println!("backup created: {}", path.display());
    store.close().await;
    Ok(())
}

async fn run_restore(config: &Config, path: &std::path::Path) -> Result<()> {
    // restore must happen before the store is opened
    let manifest = backup::restore_database(config, path)?;

    // reopen to verify the restored copy and re-run migrations
    let store = VectorStore::open(config).await?;
    let info = store.info().await?;
    println!("restored backup '{}'", manifest.backup_name);
    println!("  created: {}", manifest.created_at.format("%Y-%m-%d %H:%M"));
    println!("  collections: {}", info.collections.len());
    println!("  documents:   {}", info.total_documents);
    store.close().await;
    Ok(())
}

fn run_backups(config: &Config) -> Result<()> {
    let backups = backup::list_backups(config)?;
    if backups.is_empty() {
        println!("No backups.");
        return Ok(());
    }
    for manifest in backups {
        let docs: i64 = manifest.stats.iter().map(|s| s.document_count).sum();
        println!(
            "{}  {}  ({} collections, {} documents)",
            manifest.backup_name,
            manifest.created_at.format("%Y-%m-%d %H:%M"),
            manifest.collections.len(),
            docs
        );
    }
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
