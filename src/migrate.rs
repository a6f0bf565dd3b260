use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::ContentCategory;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            description TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            degraded INTEGER NOT NULL DEFAULT 0,
            added_at INTEGER NOT NULL,
            UNIQUE(document_id, chunk_index),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Seed the default collections, one per content category, so that
/// category-derived routing always lands on an existing collection.
pub async fn seed_default_collections(pool: &SqlitePool) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let descriptions = [
        (ContentCategory::General, "Educational materials and resources"),
        (ContentCategory::LessonPlan, "Teacher lesson plans and curricula"),
        (ContentCategory::Assessment, "Quizzes, tests, and rubrics"),
        (ContentCategory::StudentWork, "Student assignments and projects"),
        (
            ContentCategory::ParentCommunication,
            "Parent-teacher communications",
        ),
        (ContentCategory::Curriculum, "Curriculum standards and guidelines"),
    ];

    for (category, description) in descriptions {
        sqlx::query(
            r#"
            INSERT INTO collections (name, description, created_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(category.as_str())
        .bind(description)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(())
}
