//! Fake Meilisearch server for integration tests.
//!
//! Serves the subset of the Meilisearch HTTP API the sync engine uses.
//! Every task succeeds as soon as it is enqueued.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeState {
    next_task: u64,
    pub task_types: BTreeMap<u64, String>,
    pub documents: BTreeMap<String, Value>,
    pub settings: Map<String, Value>,
    pub add_batches: Vec<usize>,
    pub primary_keys: Vec<Option<String>>,
    pub auth_headers: Vec<Option<String>>,
    pub fail_documents: bool,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeMeili {
    pub url: String,
    pub state: Shared,
}

impl FakeMeili {
    pub fn documents(&self) -> BTreeMap<String, Value> {
        self.state.lock().unwrap().documents.clone()
    }

    pub fn add_batches(&self) -> Vec<usize> {
        self.state.lock().unwrap().add_batches.clone()
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().auth_headers.clone()
    }

    pub fn fail_documents(&self) {
        self.state.lock().unwrap().fail_documents = true;
    }

    pub fn seed(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .documents
            .insert(id.to_string(), json!({ "id": id }));
    }
}

fn enqueue(state: &mut FakeState, kind: &str, headers: &HeaderMap) -> Response {
    record_auth(state, headers);
    state.next_task += 1;
    let uid = state.next_task;
    state.task_types.insert(uid, kind.to_string());
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "taskUid": uid,
            "indexUid": "projects",
            "status": "enqueued",
            "type": kind,
            "enqueuedAt": "2024-01-01T00:00:00Z"
        })),
    )
        .into_response()
}

fn record_auth(state: &mut FakeState, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    state.auth_headers.push(auth);
}

fn setting_key(setting: &str) -> String {
    let mut out = String::new();
    let mut upper = false;
    for c in setting.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

async fn put_setting(
    State(state): State<Shared>,
    Path((_uid, setting)): Path<(String, String)>,
    headers: HeaderMap,
    Json(values): Json<Vec<String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    let mut values = values;
    // Meilisearch stores these two as sets and returns them sorted
    if setting == "filterable-attributes" || setting == "sortable-attributes" {
        values.sort();
        values.dedup();
    }
    state.settings.insert(setting_key(&setting), json!(values));
    enqueue(&mut state, "settingsUpdate", &headers)
}

async fn delete_documents(
    State(state): State<Shared>,
    Path(_uid): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    state.documents.clear();
    enqueue(&mut state, "documentDeletion", &headers)
}

async fn add_documents(
    State(state): State<Shared>,
    Path(_uid): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(documents): Json<Vec<Value>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if state.fail_documents {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "index unavailable", "code": "unavailable" })),
        )
            .into_response();
    }
    state.primary_keys.push(query.get("primaryKey").cloned());
    state.add_batches.push(documents.len());
    for doc in documents {
        let id = doc["id"].as_str().unwrap_or_default().to_string();
        state.documents.insert(id, doc);
    }
    enqueue(&mut state, "documentAdditionOrUpdate", &headers)
}

fn task_view(uid: u64, kind: &str) -> Value {
    json!({ "uid": uid, "indexUid": "projects", "status": "succeeded", "type": kind })
}

async fn get_task(State(state): State<Shared>, Path(uid): Path<u64>) -> Response {
    let state = state.lock().unwrap();
    match state.task_types.get(&uid) {
        Some(kind) => Json(task_view(uid, kind)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("Task `{}` not found.", uid), "code": "task_not_found" })),
        )
            .into_response(),
    }
}

async fn get_tasks(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let state = state.lock().unwrap();
    let uids: Vec<u64> = query
        .get("uids")
        .map(|s| s.split(',').filter_map(|u| u.parse().ok()).collect())
        .unwrap_or_default();
    let results: Vec<Value> = uids
        .iter()
        .filter_map(|uid| state.task_types.get(uid).map(|k| task_view(*uid, k)))
        .collect();
    Json(json!({ "results": results, "total": results.len(), "next": null }))
}

async fn stats(State(state): State<Shared>, Path(_uid): Path<String>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({
        "numberOfDocuments": state.documents.len(),
        "isIndexing": false,
        "fieldDistribution": {}
    }))
}

async fn settings(State(state): State<Shared>, Path(_uid): Path<String>) -> Json<Value> {
    let state = state.lock().unwrap();
    let mut body = json!({
        "displayedAttributes": ["*"],
        "searchableAttributes": ["*"],
        "filterableAttributes": [],
        "sortableAttributes": [],
        "rankingRules": ["words", "typo", "proximity", "attribute", "sort", "exactness"],
        "stopWords": [],
        "synonyms": {},
        "distinctAttribute": null
    });
    for (k, v) in &state.settings {
        body[k.as_str()] = v.clone();
    }
    Json(body)
}

/// Start a fake server on an ephemeral port.
pub async fn spawn_fake_meili() -> FakeMeili {
    let state: Shared = Arc::new(Mutex::new(FakeState::default()));
    let app = Router::new()
        .route("/indexes/{uid}/settings/{setting}", put(put_setting))
        .route(
            "/indexes/{uid}/documents",
            delete(delete_documents).post(add_documents),
        )
        .route("/indexes/{uid}/stats", get(stats))
        .route("/indexes/{uid}/settings", get(settings))
        .route("/tasks", get(get_tasks))
        .route("/tasks/{uid}", get(get_task))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeMeili {
        url: format!("http://{}", addr),
        state,
    }
}

/// A port with nothing listening on it.
pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
