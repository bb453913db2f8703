//! Core data types for the project search sync pipeline.
//!
//! [`HydratedProject`] is what the primary store hands back for an id;
//! [`SearchDocument`](crate::document::SearchDocument) is what the index
//! receives. The enums here mirror the store's text columns. Unknown values
//! parse into an `Unknown` variant instead of failing, so a row written by a
//! newer schema never breaks a rebuild.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque project identity as stored in the primary store.
pub type ProjectId = String;

/// Listing visibility of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Visibility {
    Listed,
    Archived,
    Private,
    Unlisted,
    Unknown,
}

impl Visibility {
    pub fn parse(s: &str) -> Self {
        match s {
            "listed" => Visibility::Listed,
            "archived" => Visibility::Archived,
            "private" => Visibility::Private,
            "unlisted" => Visibility::Unlisted,
            _ => Visibility::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Listed => "listed",
            Visibility::Archived => "archived",
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::Unknown => "unknown",
        }
    }
}

impl From<String> for Visibility {
    fn from(s: String) -> Self {
        Visibility::parse(&s)
    }
}

/// Moderation / publishing state of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum PublishingStatus {
    Approved,
    Draft,
    Processing,
    Rejected,
    Withheld,
    Unknown,
}

impl PublishingStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => PublishingStatus::Approved,
            "draft" => PublishingStatus::Draft,
            "processing" => PublishingStatus::Processing,
            "rejected" => PublishingStatus::Rejected,
            "withheld" => PublishingStatus::Withheld,
            _ => PublishingStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishingStatus::Approved => "approved",
            PublishingStatus::Draft => "draft",
            PublishingStatus::Processing => "processing",
            PublishingStatus::Rejected => "rejected",
            PublishingStatus::Withheld => "withheld",
            PublishingStatus::Unknown => "unknown",
        }
    }
}

impl From<String> for PublishingStatus {
    fn from(s: String) -> Self {
        PublishingStatus::parse(&s)
    }
}

/// Whether a project runs on the client or server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EnvironmentSupport {
    Required,
    Optional,
    Unsupported,
    Unknown,
}

impl EnvironmentSupport {
    pub fn parse(s: &str) -> Self {
        match s {
            "required" => EnvironmentSupport::Required,
            "optional" => EnvironmentSupport::Optional,
            "unsupported" => EnvironmentSupport::Unsupported,
            _ => EnvironmentSupport::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentSupport::Required => "required",
            EnvironmentSupport::Optional => "optional",
            EnvironmentSupport::Unsupported => "unsupported",
            EnvironmentSupport::Unknown => "unknown",
        }
    }

    /// `true` for `required` and `optional`.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            EnvironmentSupport::Required | EnvironmentSupport::Optional
        )
    }
}

impl From<String> for EnvironmentSupport {
    fn from(s: String) -> Self {
        EnvironmentSupport::parse(&s)
    }
}

/// A member of a project's team, in team order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub user_name: String,
    pub role: String,
    pub is_owner: bool,
}

/// Organisation that owns a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organisation {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// One image in a project's gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub id: String,
    pub name: String,
    pub featured: bool,
    pub image_file_id: String,
    pub thumbnail_file_id: String,
    pub order_index: i64,
}

/// Fully materialized project, as returned by
/// [`ProjectSource::hydrate`](crate::source::ProjectSource::hydrate).
///
/// Never persisted by the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedProject {
    pub id: ProjectId,
    pub name: String,
    pub slug: String,
    pub summary: String,
    pub icon_file_id: Option<String>,
    pub color: Option<String>,
    pub project_type: Vec<String>,
    pub loaders: Vec<String>,
    pub game_versions: Vec<String>,
    pub categories: Vec<String>,
    pub featured_categories: Vec<String>,
    pub downloads: i64,
    pub followers: i64,
    pub date_published: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub client_side: EnvironmentSupport,
    pub server_side: EnvironmentSupport,
    pub project_source_url: Option<String>,
    pub visibility: Visibility,
    pub status: PublishingStatus,
    pub members: Vec<TeamMember>,
    pub organisation: Option<Organisation>,
    pub gallery: Vec<GalleryItem>,
}

/// Secondary eligibility check applied to hydrated projects.
pub type Eligibility = fn(Visibility, PublishingStatus) -> bool;

/// Default secondary eligibility: listed or archived, and approved.
pub fn is_project_indexable(visibility: Visibility, status: PublishingStatus) -> bool {
    matches!(visibility, Visibility::Listed | Visibility::Archived)
        && status == PublishingStatus::Approved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_strings_do_not_fail() {
        assert_eq!(Visibility::parse("scheduled"), Visibility::Unknown);
        assert_eq!(PublishingStatus::parse(""), PublishingStatus::Unknown);
        assert_eq!(EnvironmentSupport::parse("maybe"), EnvironmentSupport::Unknown);

        let v: Visibility = serde_json::from_str("\"something-new\"").unwrap();
        assert_eq!(v, Visibility::Unknown);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&Visibility::Archived).unwrap(),
            "\"archived\""
        );
        assert_eq!(
            serde_json::to_string(&PublishingStatus::Withheld).unwrap(),
            "\"withheld\""
        );
    }

    #[test]
    fn environment_support_flags() {
        assert!(EnvironmentSupport::Required.is_supported());
        assert!(EnvironmentSupport::Optional.is_supported());
        assert!(!EnvironmentSupport::Unsupported.is_supported());
        assert!(!EnvironmentSupport::Unknown.is_supported());
    }

    #[test]
    fn indexable_requires_listed_or_archived_and_approved() {
        assert!(is_project_indexable(
            Visibility::Listed,
            PublishingStatus::Approved
        ));
        assert!(is_project_indexable(
            Visibility::Archived,
            PublishingStatus::Approved
        ));
        assert!(!is_project_indexable(
            Visibility::Unlisted,
            PublishingStatus::Approved
        ));
        assert!(!is_project_indexable(
            Visibility::Listed,
            PublishingStatus::Withheld
        ));
    }
}
