//! Project store schema.
//!
//! Creates the relational tables the rebuild reads from. Every statement
//! uses `IF NOT EXISTS`, so `searchsync init` can be run repeatedly.
//!
//! | Table | Holds |
//! |-------|-------|
//! | `projects` | one row per project; list fields as JSON text arrays |
//! | `users` | user accounts referenced by team membership |
//! | `team_members` | project membership, owner flag and role |
//! | `organisations` | owning organisations, joined through `projects.organisation_id` |
//! | `gallery_items` | gallery images per project, ordered by `order_index` |
//!
//! Timestamps are stored as Unix milliseconds.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organisations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            summary TEXT NOT NULL DEFAULT '',
            icon_file_id TEXT,
            color TEXT,
            project_type_json TEXT NOT NULL DEFAULT '[]',
            loaders_json TEXT NOT NULL DEFAULT '[]',
            game_versions_json TEXT NOT NULL DEFAULT '[]',
            categories_json TEXT NOT NULL DEFAULT '[]',
            featured_categories_json TEXT NOT NULL DEFAULT '[]',
            downloads INTEGER NOT NULL DEFAULT 0,
            followers INTEGER NOT NULL DEFAULT 0,
            date_published INTEGER NOT NULL,
            date_updated INTEGER NOT NULL,
            client_side TEXT NOT NULL DEFAULT 'unknown',
            server_side TEXT NOT NULL DEFAULT 'unknown',
            source_url TEXT,
            visibility TEXT NOT NULL,
            status TEXT NOT NULL,
            organisation_id TEXT,
            FOREIGN KEY (organisation_id) REFERENCES organisations(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            user_name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT '',
            is_owner INTEGER NOT NULL DEFAULT 0,
            UNIQUE(project_id, user_id),
            FOREIGN KEY (project_id) REFERENCES projects(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gallery_items (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            featured INTEGER NOT NULL DEFAULT 0,
            image_file_id TEXT NOT NULL,
            thumbnail_file_id TEXT NOT NULL,
            order_index INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Coarse listing walks (visibility, status, id)
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_projects_listing ON projects(status, visibility, id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_team_members_project ON team_members(project_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_gallery_items_project ON gallery_items(project_id, order_index)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
