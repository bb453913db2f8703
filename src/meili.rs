//! Meilisearch implementation of [`SearchIndex`].
//!
//! Talks to the Meilisearch HTTP API with `reqwest`. Every write endpoint
//! answers `202 Accepted` with an enqueued task summary; status is read back
//! from the `/tasks` routes.
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | filterable attributes | `PUT /indexes/{uid}/settings/filterable-attributes` |
//! | sortable attributes | `PUT /indexes/{uid}/settings/sortable-attributes` |
//! | ranking rules | `PUT /indexes/{uid}/settings/ranking-rules` |
//! | searchable attributes | `PUT /indexes/{uid}/settings/searchable-attributes` |
//! | delete all documents | `DELETE /indexes/{uid}/documents` |
//! | add documents | `POST /indexes/{uid}/documents?primaryKey=id` |
//! | one task | `GET /tasks/{taskUid}` |
//! | several tasks | `GET /tasks?uids=1,2,3&limit=3` |
//! | document count | `GET /indexes/{uid}/stats` |
//! | settings | `GET /indexes/{uid}/settings` |
//!
//! Errors are not retried: a non-2xx response or a network failure is
//! returned to the caller with the status and response body.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use search_sync_core::document::SearchDocument;
use search_sync_core::index::{AsyncTask, IndexSettings, SearchIndex, TaskStatus, TaskUid};

use crate::config::IndexConfig;

/// A single Meilisearch index reached over HTTP.
pub struct MeiliIndex {
    client: reqwest::Client,
    base_url: String,
    uid: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: TaskUid,
    status: TaskStatus,
}

#[derive(Deserialize)]
struct TaskView {
    uid: TaskUid,
    status: TaskStatus,
}

#[derive(Deserialize)]
struct TaskList {
    results: Vec<TaskView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    number_of_documents: u64,
}

impl MeiliIndex {
    pub fn new(
        base_url: &str,
        uid: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            uid: uid.to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.uid,
            config.resolved_api_key(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    fn index_path(&self, rest: &str) -> String {
        format!("{}/indexes/{}{}", self.base_url, self.uid, rest)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Meilisearch request failed: {}", what))?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Meilisearch API error {} ({}): {}", status, what, body_text);
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("Invalid Meilisearch response: {}", what))
    }

    async fn enqueue(&self, builder: RequestBuilder, what: &str) -> Result<AsyncTask> {
        let task: EnqueuedTask = self.send(builder, what).await?;
        debug!(task = task.task_uid, kind = what, "index task enqueued");
        Ok(AsyncTask {
            uid: task.task_uid,
            status: task.status,
        })
    }

    async fn put_setting(&self, setting: &str, values: &[String]) -> Result<AsyncTask> {
        let url = self.index_path(&format!("/settings/{}", setting));
        self.enqueue(self.request(Method::PUT, url).json(values), setting)
            .await
    }
}

#[async_trait]
impl SearchIndex for MeiliIndex {
    async fn update_filterable_attributes(&self, attributes: &[String]) -> Result<AsyncTask> {
        self.put_setting("filterable-attributes", attributes).await
    }

    async fn update_sortable_attributes(&self, attributes: &[String]) -> Result<AsyncTask> {
        self.put_setting("sortable-attributes", attributes).await
    }

    async fn update_ranking_rules(&self, rules: &[String]) -> Result<AsyncTask> {
        self.put_setting("ranking-rules", rules).await
    }

    async fn update_searchable_attributes(&self, attributes: &[String]) -> Result<AsyncTask> {
        self.put_setting("searchable-attributes", attributes).await
    }

    async fn delete_all_documents(&self) -> Result<AsyncTask> {
        let url = self.index_path("/documents");
        self.enqueue(self.request(Method::DELETE, url), "delete documents")
            .await
    }

    async fn add_documents(&self, documents: &[SearchDocument]) -> Result<AsyncTask> {
        let url = self.index_path("/documents?primaryKey=id");
        self.enqueue(
            self.request(Method::POST, url).json(documents),
            "add documents",
        )
        .await
    }

    async fn get_task(&self, uid: TaskUid) -> Result<AsyncTask> {
        let url = format!("{}/tasks/{}", self.base_url, uid);
        let task: TaskView = self.send(self.request(Method::GET, url), "get task").await?;
        Ok(AsyncTask {
            uid: task.uid,
            status: task.status,
        })
    }

    async fn get_tasks(&self, uids: &[TaskUid]) -> Result<Vec<AsyncTask>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let list = uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/tasks?uids={}&limit={}",
            self.base_url,
            list,
            uids.len()
        );
        let tasks: TaskList = self.send(self.request(Method::GET, url), "get tasks").await?;
        Ok(tasks
            .results
            .into_iter()
            .map(|t| AsyncTask {
                uid: t.uid,
                status: t.status,
            })
            .collect())
    }

    async fn document_count(&self) -> Result<u64> {
        let url = self.index_path("/stats");
        let stats: IndexStats = self
            .send(self.request(Method::GET, url), "index stats")
            .await?;
        Ok(stats.number_of_documents)
    }

    async fn settings(&self) -> Result<IndexSettings> {
        let url = self.index_path("/settings");
        self.send(self.request(Method::GET, url), "index settings")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_paths_trim_trailing_slash() {
        let index = MeiliIndex::new(
            "http://127.0.0.1:7700/",
            "projects",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            index.index_path("/documents"),
            "http://127.0.0.1:7700/indexes/projects/documents"
        );
        assert_eq!(index.uid(), "projects");
    }

    #[test]
    fn parses_enqueued_task_summary() {
        let body = r#"{"taskUid":7,"indexUid":"projects","status":"enqueued","type":"settingsUpdate","enqueuedAt":"2024-01-01T00:00:00Z"}"#;
        let task: EnqueuedTask = serde_json::from_str(body).unwrap();
        assert_eq!(task.task_uid, 7);
        assert_eq!(task.status, TaskStatus::Enqueued);
    }

    #[test]
    fn parses_task_list() {
        let body = r#"{"results":[{"uid":1,"status":"succeeded"},{"uid":2,"status":"processing"}],"total":2,"limit":2,"from":2,"next":null}"#;
        let list: TaskList = serde_json::from_str(body).unwrap();
        assert_eq!(list.results.len(), 2);
        assert!(list.results[1].status.is_pending());
    }
}
