//! Search index abstraction.
//!
//! The [`SearchIndex`] trait mirrors the subset of the Meilisearch index API
//! the sync engine uses. Every mutating call is asynchronous on the index
//! side: it returns an [`AsyncTask`] handle immediately and the work is
//! applied later. Completion is observed by polling
//! [`get_task`](SearchIndex::get_task) / [`get_tasks`](SearchIndex::get_tasks).
//!
//! [`IndexSettings::projects`] holds the fixed attribute and ranking-rule
//! configuration written on every rebuild.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::SearchDocument;

/// Index-assigned task identifier.
pub type TaskUid = u64;

/// Lifecycle state of an index task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Unknown,
}

impl TaskStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "enqueued" => TaskStatus::Enqueued,
            "processing" => TaskStatus::Processing,
            "succeeded" => TaskStatus::Succeeded,
            "failed" => TaskStatus::Failed,
            "canceled" => TaskStatus::Canceled,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Enqueued => "enqueued",
            TaskStatus::Processing => "processing",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Unknown => "unknown",
        }
    }

    /// Still enqueued or processing. Every other status is terminal.
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Enqueued | TaskStatus::Processing)
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        TaskStatus::parse(&s)
    }
}

/// Handle to work submitted to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncTask {
    pub uid: TaskUid,
    pub status: TaskStatus,
}

/// Attribute and ranking configuration of the projects index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
    pub ranking_rules: Vec<String>,
    pub searchable_attributes: Vec<String>,
}

pub const FILTERABLE_ATTRIBUTES: [&str; 7] = [
    "categories",
    "loaders",
    "type",
    "gameVersions",
    "openSource",
    "clientSide",
    "serverSide",
];

pub const SORTABLE_ATTRIBUTES: [&str; 4] = ["downloads", "followers", "dateUpdated", "datePublished"];

pub const RANKING_RULES: [&str; 5] = ["sort", "words", "typo", "proximity", "attribute"];

pub const SEARCHABLE_ATTRIBUTES: [&str; 4] = ["name", "slug", "summary", "author"];

impl IndexSettings {
    /// The fixed settings for the projects index.
    pub fn projects() -> Self {
        fn owned(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }
        Self {
            filterable_attributes: owned(&FILTERABLE_ATTRIBUTES),
            sortable_attributes: owned(&SORTABLE_ATTRIBUTES),
            ranking_rules: owned(&RANKING_RULES),
            searchable_attributes: owned(&SEARCHABLE_ATTRIBUTES),
        }
    }
}

/// Abstract search index backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`update_filterable_attributes`](SearchIndex::update_filterable_attributes) | Replace filterable attributes |
/// | [`update_sortable_attributes`](SearchIndex::update_sortable_attributes) | Replace sortable attributes |
/// | [`update_ranking_rules`](SearchIndex::update_ranking_rules) | Replace ranking rule order |
/// | [`update_searchable_attributes`](SearchIndex::update_searchable_attributes) | Replace full-text attributes |
/// | [`delete_all_documents`](SearchIndex::delete_all_documents) | Empty the index |
/// | [`add_documents`](SearchIndex::add_documents) | Bulk add or replace documents |
/// | [`get_task`](SearchIndex::get_task) | Status of one task |
/// | [`get_tasks`](SearchIndex::get_tasks) | Status of several tasks in one round-trip |
/// | [`document_count`](SearchIndex::document_count) | Number of stored documents |
/// | [`settings`](SearchIndex::settings) | Current attribute/ranking configuration |
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn update_filterable_attributes(&self, attributes: &[String]) -> Result<AsyncTask>;

    async fn update_sortable_attributes(&self, attributes: &[String]) -> Result<AsyncTask>;

    async fn update_ranking_rules(&self, rules: &[String]) -> Result<AsyncTask>;

    async fn update_searchable_attributes(&self, attributes: &[String]) -> Result<AsyncTask>;

    async fn delete_all_documents(&self) -> Result<AsyncTask>;

    async fn add_documents(&self, documents: &[SearchDocument]) -> Result<AsyncTask>;

    async fn get_task(&self, uid: TaskUid) -> Result<AsyncTask>;

    /// Statuses for `uids`, in one request. Order of the result is unspecified.
    async fn get_tasks(&self, uids: &[TaskUid]) -> Result<Vec<AsyncTask>>;

    async fn document_count(&self) -> Result<u64>;

    async fn settings(&self) -> Result<IndexSettings>;
}
