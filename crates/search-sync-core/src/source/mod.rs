//! Read access to the primary project store.
//!
//! The [`ProjectSource`] trait is the only way the sync engine touches the
//! authoritative store. It exposes a cheap, coarse listing of eligible ids
//! and a batch hydration call that returns fully materialized projects.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::models::{HydratedProject, ProjectId};

/// Abstract read API over the primary store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_eligible_ids`](ProjectSource::list_eligible_ids) | Coarse page of ids after a cursor |
/// | [`hydrate`](ProjectSource::hydrate) | Fully materialize a batch of ids |
/// | [`count_eligible`](ProjectSource::count_eligible) | Count coarse-eligible projects |
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// Ids of projects whose visibility is listed or archived and whose
    /// status is approved, in identity order, strictly after `after`.
    ///
    /// Returns at most `limit` ids and an empty vec once exhausted.
    async fn list_eligible_ids(
        &self,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<ProjectId>>;

    /// Load full records for `ids`.
    ///
    /// The result has one slot per requested id, in request order. Ids that
    /// no longer resolve come back as `None`.
    async fn hydrate(&self, ids: &[ProjectId]) -> Result<Vec<Option<HydratedProject>>>;

    /// Number of coarse-eligible projects.
    async fn count_eligible(&self) -> Result<u64>;
}
