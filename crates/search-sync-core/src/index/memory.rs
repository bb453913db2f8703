//! In-memory [`SearchIndex`] for tests.
//!
//! Mutations are applied to the stored state as soon as they are
//! submitted; only the *reported* task status is simulated. The
//! [`TaskLifecycle`] decides how many status queries a task answers with
//! `processing` before it reports its terminal status, which makes polling
//! behavior deterministic.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::document::SearchDocument;

use super::{AsyncTask, IndexSettings, SearchIndex, TaskStatus, TaskUid};

/// How tasks created from now on progress when polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLifecycle {
    /// Report `terminal` after this many `processing` answers.
    AfterPolls { polls: u32, terminal: TaskStatus },
    /// Never leave `processing`.
    Stuck,
}

impl Default for TaskLifecycle {
    fn default() -> Self {
        TaskLifecycle::AfterPolls {
            polls: 0,
            terminal: TaskStatus::Succeeded,
        }
    }
}

struct TaskState {
    kind: &'static str,
    remaining: Option<u32>,
    terminal: TaskStatus,
}

impl TaskState {
    fn poll(&mut self) -> TaskStatus {
        match self.remaining {
            None => TaskStatus::Processing,
            Some(0) => self.terminal,
            Some(n) => {
                self.remaining = Some(n - 1);
                TaskStatus::Processing
            }
        }
    }
}

#[derive(Default)]
struct State {
    settings: Option<IndexSettings>,
    documents: BTreeMap<String, SearchDocument>,
    tasks: HashMap<TaskUid, TaskState>,
    next_uid: TaskUid,
    lifecycle: TaskLifecycle,
    add_batches: Vec<usize>,
    status_queries: usize,
    fail_add_on_batch: Option<usize>,
}

/// In-memory search index.
pub struct InMemoryIndex {
    state: RwLock<State>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    pub fn set_lifecycle(&self, lifecycle: TaskLifecycle) {
        self.state.write().unwrap().lifecycle = lifecycle;
    }

    /// Fail the `n`th (1-based) `add_documents` call.
    pub fn fail_add_documents_on(&self, n: usize) {
        self.state.write().unwrap().fail_add_on_batch = Some(n);
    }

    /// Seed a document without going through a task.
    pub fn seed(&self, document: SearchDocument) {
        self.state
            .write()
            .unwrap()
            .documents
            .insert(document.id.clone(), document);
    }

    pub fn documents(&self) -> Vec<SearchDocument> {
        self.state
            .read()
            .unwrap()
            .documents
            .values()
            .cloned()
            .collect()
    }

    /// Sizes of every accepted `add_documents` batch, in submission order.
    pub fn add_batches(&self) -> Vec<usize> {
        self.state.read().unwrap().add_batches.clone()
    }

    /// Number of `get_task` / `get_tasks` round-trips served.
    pub fn status_queries(&self) -> usize {
        self.state.read().unwrap().status_queries
    }

    /// Kinds of submitted tasks in uid order (e.g. `"documentAdditionOrUpdate"`).
    pub fn task_kinds(&self) -> Vec<&'static str> {
        let state = self.state.read().unwrap();
        let mut uids: Vec<&TaskUid> = state.tasks.keys().collect();
        uids.sort();
        uids.into_iter().map(|uid| state.tasks[uid].kind).collect()
    }

    fn enqueue(state: &mut State, kind: &'static str) -> AsyncTask {
        let uid = state.next_uid;
        state.next_uid += 1;
        let (remaining, terminal) = match state.lifecycle {
            TaskLifecycle::AfterPolls { polls, terminal } => (Some(polls), terminal),
            TaskLifecycle::Stuck => (None, TaskStatus::Processing),
        };
        state.tasks.insert(
            uid,
            TaskState {
                kind,
                remaining,
                terminal,
            },
        );
        AsyncTask {
            uid,
            status: TaskStatus::Enqueued,
        }
    }

    fn update_settings(&self, apply: impl FnOnce(&mut IndexSettings)) -> AsyncTask {
        let mut state = self.state.write().unwrap();
        let settings = state.settings.get_or_insert_with(default_settings);
        apply(settings);
        Self::enqueue(&mut state, "settingsUpdate")
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings of a freshly created Meilisearch index.
fn default_settings() -> IndexSettings {
    IndexSettings {
        filterable_attributes: Vec::new(),
        sortable_attributes: Vec::new(),
        ranking_rules: ["words", "typo", "proximity", "attribute", "sort", "exactness"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        searchable_attributes: vec!["*".to_string()],
    }
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn update_filterable_attributes(&self, attributes: &[String]) -> Result<AsyncTask> {
        Ok(self.update_settings(|s| s.filterable_attributes = attributes.to_vec()))
    }

    async fn update_sortable_attributes(&self, attributes: &[String]) -> Result<AsyncTask> {
        Ok(self.update_settings(|s| s.sortable_attributes = attributes.to_vec()))
    }

    async fn update_ranking_rules(&self, rules: &[String]) -> Result<AsyncTask> {
        Ok(self.update_settings(|s| s.ranking_rules = rules.to_vec()))
    }

    async fn update_searchable_attributes(&self, attributes: &[String]) -> Result<AsyncTask> {
        Ok(self.update_settings(|s| s.searchable_attributes = attributes.to_vec()))
    }

    async fn delete_all_documents(&self) -> Result<AsyncTask> {
        let mut state = self.state.write().unwrap();
        state.documents.clear();
        Ok(Self::enqueue(&mut state, "documentDeletion"))
    }

    async fn add_documents(&self, documents: &[SearchDocument]) -> Result<AsyncTask> {
        let mut state = self.state.write().unwrap();
        let batch_number = state.add_batches.len() + 1;
        if state.fail_add_on_batch == Some(batch_number) {
            bail!("index unavailable: 503 Service Unavailable");
        }
        for doc in documents {
            state.documents.insert(doc.id.clone(), doc.clone());
        }
        state.add_batches.push(documents.len());
        Ok(Self::enqueue(&mut state, "documentAdditionOrUpdate"))
    }

    async fn get_task(&self, uid: TaskUid) -> Result<AsyncTask> {
        let mut state = self.state.write().unwrap();
        state.status_queries += 1;
        let task = state
            .tasks
            .get_mut(&uid)
            .ok_or_else(|| anyhow!("task {} not found", uid))?;
        Ok(AsyncTask {
            uid,
            status: task.poll(),
        })
    }

    async fn get_tasks(&self, uids: &[TaskUid]) -> Result<Vec<AsyncTask>> {
        let mut state = self.state.write().unwrap();
        state.status_queries += 1;
        Ok(uids
            .iter()
            .filter_map(|uid| {
                state.tasks.get_mut(uid).map(|task| AsyncTask {
                    uid: *uid,
                    status: task.poll(),
                })
            })
            .collect())
    }

    async fn document_count(&self) -> Result<u64> {
        Ok(self.state.read().unwrap().documents.len() as u64)
    }

    async fn settings(&self) -> Result<IndexSettings> {
        Ok(self
            .state
            .read()
            .unwrap()
            .settings
            .clone()
            .unwrap_or_else(default_settings))
    }
}
