//! # classvault
//!
//! A local-first ingestion and retrieval engine for educational documents.
//!
//! classvault turns heterogeneous files (PDF, Word, Markdown, HTML, CSV,
//! JSON, YAML, plain text) into searchable chunks: text is extracted,
//! classified into educational categories, split into overlapping word
//! windows, embedded via a local Ollama-compatible service (with a
//! deterministic offline fallback), and persisted into named collections in
//! SQLite for nearest-neighbor search.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────┐   ┌───────────┐
//! │ Uploads  │──▶│ Extract→Classify→Chunk     │──▶│  SQLite    │
//! │ fs files │   │        →Embed              │   │ vectors    │
//! └──────────┘   └───────────────────────────┘   └─────┬─────┘
//!                                                      │
//!                                    ┌─────────────────┤
//!                                    ▼                 ▼
//!                               ┌─────────┐      ┌──────────┐
//!                               │   CLI   │      │  search  │
//!                               │ (cvault)│      │  ranking │
//!                               └─────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cvault init                          # create store + default collections
//! cvault ingest ./uploads --recursive  # ingest a directory
//! cvault search "how do plants make energy?" --collection educational_content
//! cvault stats lesson_plan
//! cvault backup
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`extract`] | Multi-format text extraction |
//! | [`classify`] | Educational content classification |
//! | [`chunk`] | Overlapping word-window chunking |
//! | [`embedding`] | Embedding service client + deterministic fallback |
//! | [`store`] | Vector store over SQLite |
//! | [`ingest`] | Per-file and directory ingestion orchestration |
//! | [`backup`] | Backup / restore / listing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations and default collections |

pub mod backup;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod store;
