//! # Project Search Sync
//!
//! Rebuilds a Meilisearch projects index from a relational project store.
//!
//! A rebuild provisions the index once (settings plus a full delete), then
//! walks the store in id order one page at a time: list coarse-eligible ids,
//! hydrate them, drop anything that fails the eligibility predicate, format
//! the survivors as search documents, submit them, and wait for the index to
//! confirm. Index writes are asynchronous, so every wait is bounded and a
//! timeout is logged rather than treated as a failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │   SQLite    │──▶│  sync orchestrator   │──▶│ Meilisearch  │
//! │ project     │   │ page → hydrate →     │   │ index +      │
//! │ store       │   │ filter → format      │   │ task queue   │
//! └─────────────┘   └──────────┬───────────┘   └──────┬───────┘
//!                              │    task_wait (poll)   │
//!                              └───────────────────────┘
//! ```
//!
//! Data model, document formatting, paging, and the collaborator traits live
//! in the runtime-free `search-sync-core` crate; this crate supplies the
//! SQLite and HTTP implementations, the awaiting and orchestration logic,
//! and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Project store schema |
//! | [`sqlite_source`] | SQLite project source |
//! | [`meili`] | Meilisearch HTTP client |
//! | [`task_wait`] | Bounded polling of index tasks |
//! | [`provision`] | Index settings and clearing |
//! | [`sync`] | Rebuild orchestrator |
//! | [`progress`] | Rebuild progress on stderr |
//! | [`stats`] | Store vs index overview |
//! | [`show`] | Single-project document preview |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod logging;
pub mod meili;
pub mod migrate;
pub mod progress;
pub mod provision;
pub mod show;
pub mod sqlite_source;
pub mod stats;
pub mod sync;
pub mod task_wait;
