//! Search document projection.
//!
//! [`format_search_document`] flattens a [`HydratedProject`] into the
//! [`SearchDocument`] shape stored in the search index. It is a pure
//! function: every field has a default (null, `false`, empty) and nothing
//! in it can fail, so the same project always yields the same bytes once
//! serialized.
//!
//! # Resolution rules
//!
//! | Field | Rule |
//! |-------|------|
//! | `author` | organisation slug, else username of the first team member |
//! | `featured_gallery` | URL of the first gallery item flagged `featured`, else null |
//! | `clientSide` / `serverSide` | support is `required` or `optional` |
//! | `openSource` | a source repository URL is present |
//! | `isOrgOwned` | an organisation is attached |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{HydratedProject, ProjectId, Visibility};

/// Flattened, denormalized project as stored in the search index.
///
/// Field names on the wire are camelCase, except `featured_gallery`, which
/// existing index consumers already query under that name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub id: ProjectId,
    pub name: String,
    pub slug: String,
    pub icon_url: Option<String>,
    pub loaders: Vec<String>,
    #[serde(rename = "type")]
    pub project_type: Vec<String>,
    pub game_versions: Vec<String>,
    pub categories: Vec<String>,
    pub featured_categories: Vec<String>,
    pub summary: String,
    pub downloads: i64,
    pub followers: i64,
    pub date_published: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub open_source: bool,
    pub client_side: bool,
    pub server_side: bool,
    #[serde(rename = "featured_gallery")]
    pub featured_gallery: Option<String>,
    pub color: Option<String>,
    pub author: Option<String>,
    pub is_org_owned: bool,
    pub visibility: Visibility,
}

/// Builds public URLs for project media files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrls {
    cdn_base: String,
}

impl MediaUrls {
    pub fn new(cdn_base: &str) -> Self {
        Self {
            cdn_base: cdn_base.trim_end_matches('/').to_string(),
        }
    }

    /// `{cdn}/project/{project_id}/{file_id}`
    pub fn icon_url(&self, project_id: &str, icon_file_id: Option<&str>) -> Option<String> {
        icon_file_id
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}/project/{}/{}", self.cdn_base, project_id, id))
    }

    /// `{cdn}/project/{project_id}/gallery/{file_id}`
    pub fn gallery_url(&self, project_id: &str, file_id: &str) -> String {
        format!("{}/project/{}/gallery/{}", self.cdn_base, project_id, file_id)
    }
}

/// Project a hydrated record into its search document.
pub fn format_search_document(project: &HydratedProject, urls: &MediaUrls) -> SearchDocument {
    let author = match &project.organisation {
        Some(org) if !org.slug.is_empty() => Some(org.slug.clone()),
        _ => project.members.first().map(|m| m.user_name.clone()),
    };

    let featured_gallery = project
        .gallery
        .iter()
        .find(|item| item.featured)
        .map(|item| urls.gallery_url(&project.id, &item.thumbnail_file_id));

    let open_source = project
        .project_source_url
        .as_deref()
        .is_some_and(|url| !url.is_empty());

    let is_org_owned = project
        .organisation
        .as_ref()
        .is_some_and(|org| !org.slug.is_empty());

    SearchDocument {
        id: project.id.clone(),
        name: project.name.clone(),
        slug: project.slug.clone(),
        icon_url: urls.icon_url(&project.id, project.icon_file_id.as_deref()),
        loaders: project.loaders.clone(),
        project_type: project.project_type.clone(),
        game_versions: project.game_versions.clone(),
        categories: project.categories.clone(),
        featured_categories: project.featured_categories.clone(),
        summary: project.summary.clone(),
        downloads: project.downloads,
        followers: project.followers,
        date_published: project.date_published,
        date_updated: project.date_updated,
        open_source,
        client_side: project.client_side.is_supported(),
        server_side: project.server_side.is_supported(),
        featured_gallery,
        color: project.color.clone(),
        author,
        is_org_owned,
        visibility: project.visibility,
    }
}
