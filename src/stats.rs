//! Store and index health overview.
//!
//! Compares what the store says should be searchable with what the index
//! currently holds. Used by `searchsync stats` to give confidence that the
//! last rebuild went through. Index failures are shown, not raised, so the
//! store side is still reported when the index is down.

use anyhow::Result;
use std::collections::BTreeSet;

use search_sync_core::index::{IndexSettings, SearchIndex};
use search_sync_core::source::ProjectSource;

use crate::config::Config;
use crate::db;
use crate::meili::MeiliIndex;
use crate::sqlite_source::SqliteProjectSource;

/// Snapshot of the index side.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexState {
    pub documents: u64,
    pub settings: IndexSettings,
}

impl IndexState {
    /// Whether the live settings equal the ones a rebuild writes.
    ///
    /// Meilisearch reports filterable and sortable attributes as sorted
    /// sets, so those compare without order. Ranking rules and searchable
    /// attributes are ordered.
    pub fn settings_current(&self) -> bool {
        let expected = IndexSettings::projects();
        as_set(&self.settings.filterable_attributes) == as_set(&expected.filterable_attributes)
            && as_set(&self.settings.sortable_attributes) == as_set(&expected.sortable_attributes)
            && self.settings.ranking_rules == expected.ranking_rules
            && self.settings.searchable_attributes == expected.searchable_attributes
    }
}

fn as_set(values: &[String]) -> BTreeSet<&str> {
    values.iter().map(|v| v.as_str()).collect()
}

#[derive(Debug, Clone)]
pub struct SyncStats {
    /// Projects passing the coarse visibility / status filter.
    pub eligible_projects: u64,
    pub index: std::result::Result<IndexState, String>,
}

pub async fn gather_stats(source: &dyn ProjectSource, index: &dyn SearchIndex) -> Result<SyncStats> {
    let eligible_projects = source.count_eligible().await?;
    let index = match read_index(index).await {
        Ok(state) => Ok(state),
        Err(e) => Err(format!("{:#}", e)),
    };
    Ok(SyncStats {
        eligible_projects,
        index,
    })
}

async fn read_index(index: &dyn SearchIndex) -> Result<IndexState> {
    Ok(IndexState {
        documents: index.document_count().await?,
        settings: index.settings().await?,
    })
}

/// Run the stats command: query both sides and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let source = SqliteProjectSource::new(pool);
    let index = MeiliIndex::from_config(&config.index)?;

    let stats = gather_stats(&source, &index).await;
    source.close().await;
    let stats = stats?;

    println!("Project Search Sync: Stats");
    println!("==========================");
    println!();
    println!("  Database:           {}", config.db.path.display());
    println!("  Eligible projects:  {}", stats.eligible_projects);
    println!();
    println!("  Index:              {} ({})", index.uid(), config.index.url);
    match &stats.index {
        Ok(state) => {
            println!("  Documents:          {}", state.documents);
            println!(
                "  Settings:           {}",
                if state.settings_current() {
                    "current"
                } else {
                    "differ from rebuild settings"
                }
            );
            if state.documents > stats.eligible_projects {
                println!("  Note: index holds more documents than eligible projects");
            }
        }
        Err(message) => {
            println!("  Unreachable:        {}", message);
        }
    }
    println!();

    Ok(())
}
