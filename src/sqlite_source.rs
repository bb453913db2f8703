//! SQLite-backed [`ProjectSource`] implementation.
//!
//! Coarse listing is a single indexed range scan over `projects`. Hydration
//! loads a whole page in three queries (projects with their organisation,
//! team members, gallery items) and stitches them together in memory,
//! returning results in the order the ids were requested.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

use search_sync_core::cursor::Cursor;
use search_sync_core::models::{
    EnvironmentSupport, GalleryItem, HydratedProject, Organisation, ProjectId, PublishingStatus,
    TeamMember, Visibility,
};
use search_sync_core::source::ProjectSource;

/// Visibility / status filter shared by listing and counting.
const COARSE_FILTER: &str = "visibility IN ('listed', 'archived') AND status = 'approved'";

/// SQLite implementation of the [`ProjectSource`] trait.
pub struct SqliteProjectSource {
    pool: SqlitePool,
}

impl SqliteProjectSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert or replace a project together with its organisation, team and
    /// gallery. Users are created on demand, keyed by user name.
    pub async fn upsert_project(&self, project: &HydratedProject) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(org) = &project.organisation {
            sqlx::query(
                r#"
                INSERT INTO organisations (id, name, slug) VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET name = excluded.name, slug = excluded.slug
                "#,
            )
            .bind(&org.id)
            .bind(&org.name)
            .bind(&org.slug)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO projects (id, name, slug, summary, icon_file_id, color,
                                  project_type_json, loaders_json, game_versions_json,
                                  categories_json, featured_categories_json,
                                  downloads, followers, date_published, date_updated,
                                  client_side, server_side, source_url,
                                  visibility, status, organisation_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug,
                summary = excluded.summary,
                icon_file_id = excluded.icon_file_id,
                color = excluded.color,
                project_type_json = excluded.project_type_json,
                loaders_json = excluded.loaders_json,
                game_versions_json = excluded.game_versions_json,
                categories_json = excluded.categories_json,
                featured_categories_json = excluded.featured_categories_json,
                downloads = excluded.downloads,
                followers = excluded.followers,
                date_published = excluded.date_published,
                date_updated = excluded.date_updated,
                client_side = excluded.client_side,
                server_side = excluded.server_side,
                source_url = excluded.source_url,
                visibility = excluded.visibility,
                status = excluded.status,
                organisation_id = excluded.organisation_id
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.slug)
        .bind(&project.summary)
        .bind(&project.icon_file_id)
        .bind(&project.color)
        .bind(serde_json::to_string(&project.project_type)?)
        .bind(serde_json::to_string(&project.loaders)?)
        .bind(serde_json::to_string(&project.game_versions)?)
        .bind(serde_json::to_string(&project.categories)?)
        .bind(serde_json::to_string(&project.featured_categories)?)
        .bind(project.downloads)
        .bind(project.followers)
        .bind(project.date_published.timestamp_millis())
        .bind(project.date_updated.timestamp_millis())
        .bind(project.client_side.as_str())
        .bind(project.server_side.as_str())
        .bind(&project.project_source_url)
        .bind(project.visibility.as_str())
        .bind(project.status.as_str())
        .bind(project.organisation.as_ref().map(|o| o.id.as_str()))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM team_members WHERE project_id = ?")
            .bind(&project.id)
            .execute(&mut *tx)
            .await?;
        for member in &project.members {
            sqlx::query("INSERT OR IGNORE INTO users (id, user_name) VALUES (?, ?)")
                .bind(&member.user_name)
                .bind(&member.user_name)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO team_members (project_id, user_id, role, is_owner) VALUES (?, ?, ?, ?)",
            )
            .bind(&project.id)
            .bind(&member.user_name)
            .bind(&member.role)
            .bind(member.is_owner)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM gallery_items WHERE project_id = ?")
            .bind(&project.id)
            .execute(&mut *tx)
            .await?;
        for item in &project.gallery {
            sqlx::query(
                r#"
                INSERT INTO gallery_items (id, project_id, name, featured,
                                           image_file_id, thumbnail_file_id, order_index)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(&project.id)
            .bind(&item.name)
            .bind(item.featured)
            .bind(&item.image_file_id)
            .bind(&item.thumbnail_file_id)
            .bind(item.order_index)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn in_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, ids: &'a [ProjectId]) {
    builder.push(" (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");
}

fn json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON list in column {}", column))
}

fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let millis: i64 = row.try_get(column)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("Timestamp out of range in column {}: {}", column, millis))
}

fn project_from_row(row: &SqliteRow) -> Result<HydratedProject> {
    let organisation = match row.try_get::<Option<String>, _>("org_id")? {
        Some(id) => Some(Organisation {
            id,
            name: row.try_get("org_name")?,
            slug: row.try_get("org_slug")?,
        }),
        None => None,
    };

    Ok(HydratedProject {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        summary: row.try_get("summary")?,
        icon_file_id: row.try_get("icon_file_id")?,
        color: row.try_get("color")?,
        project_type: json_list(row, "project_type_json")?,
        loaders: json_list(row, "loaders_json")?,
        game_versions: json_list(row, "game_versions_json")?,
        categories: json_list(row, "categories_json")?,
        featured_categories: json_list(row, "featured_categories_json")?,
        downloads: row.try_get("downloads")?,
        followers: row.try_get("followers")?,
        date_published: timestamp(row, "date_published")?,
        date_updated: timestamp(row, "date_updated")?,
        client_side: EnvironmentSupport::parse(row.try_get::<&str, _>("client_side")?),
        server_side: EnvironmentSupport::parse(row.try_get::<&str, _>("server_side")?),
        project_source_url: row.try_get("source_url")?,
        visibility: Visibility::parse(row.try_get::<&str, _>("visibility")?),
        status: PublishingStatus::parse(row.try_get::<&str, _>("status")?),
        members: Vec::new(),
        organisation,
        gallery: Vec::new(),
    })
}

#[async_trait]
impl ProjectSource for SqliteProjectSource {
    async fn list_eligible_ids(
        &self,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<ProjectId>> {
        let sql = format!(
            "SELECT id FROM projects WHERE {} AND id > ? ORDER BY id LIMIT ?",
            COARSE_FILTER
        );
        let after = after.map(|c| c.last_id()).unwrap_or("");
        let ids: Vec<String> = sqlx::query_scalar(&sql)
            .bind(after)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn hydrate(&self, ids: &[ProjectId]) -> Result<Vec<Option<HydratedProject>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT p.*, o.id AS org_id, o.name AS org_name, o.slug AS org_slug
            FROM projects p
            LEFT JOIN organisations o ON o.id = p.organisation_id
            WHERE p.id IN"#,
        );
        in_list(&mut builder, ids);
        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut projects: HashMap<String, HydratedProject> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let project = project_from_row(row)?;
            projects.insert(project.id.clone(), project);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT tm.project_id, u.user_name, tm.role, tm.is_owner
            FROM team_members tm
            JOIN users u ON u.id = tm.user_id
            WHERE tm.project_id IN"#,
        );
        in_list(&mut builder, ids);
        builder.push(" ORDER BY tm.project_id, tm.is_owner DESC, tm.id");
        for row in builder.build().fetch_all(&self.pool).await? {
            let project_id: String = row.try_get("project_id")?;
            if let Some(project) = projects.get_mut(&project_id) {
                project.members.push(TeamMember {
                    user_name: row.try_get("user_name")?,
                    role: row.try_get("role")?,
                    is_owner: row.try_get("is_owner")?,
                });
            }
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT id, project_id, name, featured, image_file_id, thumbnail_file_id, order_index
            FROM gallery_items
            WHERE project_id IN"#,
        );
        in_list(&mut builder, ids);
        builder.push(" ORDER BY project_id, order_index, id");
        for row in builder.build().fetch_all(&self.pool).await? {
            let project_id: String = row.try_get("project_id")?;
            if let Some(project) = projects.get_mut(&project_id) {
                project.gallery.push(GalleryItem {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    featured: row.try_get("featured")?,
                    image_file_id: row.try_get("image_file_id")?,
                    thumbnail_file_id: row.try_get("thumbnail_file_id")?,
                    order_index: row.try_get("order_index")?,
                });
            }
        }

        Ok(ids.iter().map(|id| projects.remove(id)).collect())
    }

    async fn count_eligible(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM projects WHERE {}", COARSE_FILTER);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}
