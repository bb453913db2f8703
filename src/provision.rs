//! One-time index provisioning for a rebuild.
//!
//! Writes the fixed projects index configuration and empties the index.
//! The four settings updates and the deletion are submitted back to back,
//! then awaited as one group. A group timeout is logged and otherwise
//! ignored; a failed submission is returned to the caller.

use anyhow::{Context, Result};
use tracing::{info, warn};

use search_sync_core::index::{IndexSettings, SearchIndex};

use crate::task_wait::{await_tasks, WaitOutcome, WaitPolicy};

/// Configure the index with `settings` and delete every document in it.
pub async fn provision(
    index: &dyn SearchIndex,
    settings: &IndexSettings,
    policy: WaitPolicy,
) -> Result<WaitOutcome> {
    let tasks = vec![
        index
            .update_filterable_attributes(&settings.filterable_attributes)
            .await
            .context("updating filterable attributes")?,
        index
            .update_sortable_attributes(&settings.sortable_attributes)
            .await
            .context("updating sortable attributes")?,
        index
            .update_ranking_rules(&settings.ranking_rules)
            .await
            .context("updating ranking rules")?,
        index
            .update_searchable_attributes(&settings.searchable_attributes)
            .await
            .context("updating searchable attributes")?,
        index
            .delete_all_documents()
            .await
            .context("deleting existing documents")?,
    ];

    let outcome = await_tasks(index, &tasks, policy).await?;
    if outcome.timed_out() {
        warn!("index provisioning did not confirm in time; configuration may be incomplete");
    } else {
        info!(tasks = tasks.len(), "index provisioned");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_sync_core::document::{format_search_document, MediaUrls};
    use search_sync_core::index::memory::{InMemoryIndex, TaskLifecycle};
    use search_sync_core::source::memory::sample_project;
    use std::time::Duration;

    fn policy() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(100), Duration::from_millis(30_000))
    }

    #[tokio::test(start_paused = true)]
    async fn configures_settings_and_empties_index() {
        let index = InMemoryIndex::new();
        let urls = MediaUrls::new("https://cdn.test");
        index.seed(format_search_document(&sample_project("old-1"), &urls));
        index.seed(format_search_document(&sample_project("old-2"), &urls));

        let settings = IndexSettings::projects();
        let outcome = provision(&index, &settings, policy()).await.unwrap();
        assert!(!outcome.timed_out());

        assert_eq!(index.settings().await.unwrap(), settings);
        assert_eq!(index.document_count().await.unwrap(), 0);
        assert_eq!(
            index.task_kinds(),
            vec![
                "settingsUpdate",
                "settingsUpdate",
                "settingsUpdate",
                "settingsUpdate",
                "documentDeletion"
            ]
        );
        // all five tasks awaited together
        assert_eq!(index.status_queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_not_raised() {
        let index = InMemoryIndex::new();
        index.set_lifecycle(TaskLifecycle::Stuck);

        let outcome = provision(&index, &IndexSettings::projects(), policy())
            .await
            .unwrap();
        assert!(outcome.timed_out());
    }
}
