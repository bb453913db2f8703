//! # Search Sync Core
//!
//! Runtime-free logic for Project Search Sync: the project data model, the
//! search document transformer, cursor pagination, and the two collaborator
//! traits the sync engine is written against ([`source::ProjectSource`] and
//! [`index::SearchIndex`]), each with an in-memory implementation.
//!
//! This crate contains no tokio, sqlx, or HTTP client dependencies.

pub mod cursor;
pub mod document;
pub mod index;
pub mod models;
pub mod source;
