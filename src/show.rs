//! Single-project preview.
//!
//! Hydrates one project from the store and prints the search document the
//! rebuild would submit for it. Nothing is written to the index. Used by the
//! `searchsync show` CLI command to inspect the transformation.

use anyhow::{bail, Result};

use search_sync_core::document::{format_search_document, MediaUrls, SearchDocument};
use search_sync_core::models::{is_project_indexable, HydratedProject};
use search_sync_core::source::ProjectSource;

use crate::config::Config;
use crate::db;
use crate::sqlite_source::SqliteProjectSource;

/// Load `id` and format it as a [`SearchDocument`].
///
/// The project is loaded regardless of its visibility or status, so
/// ineligible projects can be inspected too.
pub async fn preview_document(
    source: &dyn ProjectSource,
    id: &str,
    urls: &MediaUrls,
) -> Result<(HydratedProject, SearchDocument)> {
    let mut hydrated = source.hydrate(&[id.to_string()]).await?;
    let project = match hydrated.pop().flatten() {
        Some(p) => p,
        None => bail!("project not found: {}", id),
    };
    let document = format_search_document(&project, urls);
    Ok((project, document))
}

/// CLI entry point: print the document as pretty JSON on stdout.
pub async fn run_show(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let source = SqliteProjectSource::new(pool);
    let urls = MediaUrls::new(&config.media.cdn_base_url);

    let result = preview_document(&source, id, &urls).await;
    source.close().await;
    let (project, document) = result?;

    if !is_project_indexable(project.visibility, project.status) {
        eprintln!(
            "note: {} is {} / {} and would not be indexed",
            project.id,
            project.visibility.as_str(),
            project.status.as_str()
        );
    }
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
