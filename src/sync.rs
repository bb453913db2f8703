//! Full index rebuild orchestration.
//!
//! Drives one rebuild end to end:
//!
//! ```text
//! Provisioning ─▶ Paging ─▶ Hydrating ─▶ Submitting ─▶ Awaiting ─┐
//!                   ▲                                            │
//!                   └──────────── next cursor ───────────────────┘
//! ```
//!
//! Pages are processed strictly one after another; nothing is pipelined.
//! The run stops when the store returns an empty page, or when a page
//! produces fewer documents than the page size. The second rule counts
//! documents that survived hydration and the secondary eligibility check,
//! so a page that loses records to either stops the run even if the store
//! has more eligible ids after it.
//!
//! [`rebuild_index`] never returns an error. Failures end the run, are
//! logged, and are recorded in the [`SyncReport`].

use anyhow::Result;
use std::fmt;
use tracing::{debug, error, info, warn, Instrument};

use search_sync_core::cursor::{next_page, Cursor};
use search_sync_core::document::{format_search_document, MediaUrls, SearchDocument};
use search_sync_core::index::{IndexSettings, SearchIndex};
use search_sync_core::models::{is_project_indexable, Eligibility};
use search_sync_core::source::ProjectSource;

use crate::config::Config;
use crate::db;
use crate::logging::rebuild_span;
use crate::meili::MeiliIndex;
use crate::progress::{RebuildProgressEvent, RebuildProgressReporter};
use crate::provision::provision;
use crate::sqlite_source::SqliteProjectSource;
use crate::task_wait::{await_task, WaitPolicy};

/// Knobs for one rebuild.
#[derive(Clone)]
pub struct RebuildOptions {
    pub page_size: usize,
    pub task_wait: WaitPolicy,
    pub tasks_wait: WaitPolicy,
    pub settings: IndexSettings,
    pub urls: MediaUrls,
    pub eligible: Eligibility,
}

impl RebuildOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.sync.page_size,
            task_wait: config.sync.task_wait(),
            tasks_wait: config.sync.tasks_wait(),
            settings: IndexSettings::projects(),
            urls: MediaUrls::new(&config.media.cdn_base_url),
            eligible: is_project_indexable,
        }
    }
}

/// Where in the loop a rebuild was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Connecting,
    Provisioning,
    Paging,
    Hydrating,
    Submitting,
    Awaiting,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStage::Connecting => "connecting",
            SyncStage::Provisioning => "provisioning",
            SyncStage::Paging => "paging",
            SyncStage::Hydrating => "hydrating",
            SyncStage::Submitting => "submitting",
            SyncStage::Awaiting => "awaiting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Failed { stage: SyncStage, error: String },
}

/// Counters accumulated over one rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub pages: u64,
    pub ids_seen: u64,
    /// Ids that listed as eligible but did not hydrate.
    pub missing: u64,
    /// Hydrated projects dropped by the secondary eligibility check.
    pub rejected: u64,
    /// Documents sent to the index, whatever became of their task.
    pub submitted: u64,
    /// Submitted documents whose batch did not end `failed` / `canceled`.
    /// Batches that timed out are included: their fate is unknown.
    pub indexed: u64,
    pub provision_timed_out: bool,
    pub await_timeouts: u64,
    /// Document batches whose task ended `failed` or `canceled`.
    pub failed_tasks: u64,
}

impl SyncReport {
    fn new() -> Self {
        Self {
            outcome: SyncOutcome::Completed,
            pages: 0,
            ids_seen: 0,
            missing: 0,
            rejected: 0,
            submitted: 0,
            indexed: 0,
            provision_timed_out: false,
            await_timeouts: 0,
            failed_tasks: 0,
        }
    }

    pub fn failed(stage: SyncStage, error: &anyhow::Error) -> Self {
        let mut report = Self::new();
        report.outcome = SyncOutcome::Failed {
            stage,
            error: format!("{:#}", error),
        };
        report
    }

    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Completed
    }
}

struct StageFailure {
    stage: SyncStage,
    error: anyhow::Error,
}

trait AtStage<T> {
    fn at(self, stage: SyncStage) -> std::result::Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: SyncStage) -> std::result::Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

/// Rebuild the index from the store.
///
/// Provisions the index once, then pages through coarse-eligible ids,
/// hydrating, filtering, transforming, and submitting one page at a time.
/// Any failure is logged and ends the run; it is reported in the returned
/// [`SyncReport`], never as an error.
pub async fn rebuild_index(
    index: &dyn SearchIndex,
    source: &dyn ProjectSource,
    opts: &RebuildOptions,
    progress: &dyn RebuildProgressReporter,
) -> SyncReport {
    let mut report = SyncReport::new();

    if let Err(failure) = run(index, source, opts, progress, &mut report).await {
        let message = format!("{:#}", failure.error);
        error!(stage = %failure.stage, error = %message, "index rebuild aborted");
        report.outcome = SyncOutcome::Failed {
            stage: failure.stage,
            error: message,
        };
    } else {
        info!(
            pages = report.pages,
            indexed = report.indexed,
            missing = report.missing,
            rejected = report.rejected,
            "index rebuild complete"
        );
    }

    progress.report(RebuildProgressEvent::Finished {
        indexed: report.indexed,
    });
    report
}

async fn run(
    index: &dyn SearchIndex,
    source: &dyn ProjectSource,
    opts: &RebuildOptions,
    progress: &dyn RebuildProgressReporter,
    report: &mut SyncReport,
) -> std::result::Result<(), StageFailure> {
    progress.report(RebuildProgressEvent::Provisioning);
    let outcome = provision(index, &opts.settings, opts.tasks_wait)
        .await
        .at(SyncStage::Provisioning)?;
    report.provision_timed_out = outcome.timed_out();

    let mut cursor: Option<Cursor> = None;
    loop {
        let pages_before = report.pages;
        let next = sync_page(index, source, opts, cursor.as_ref(), report).await?;
        if report.pages > pages_before {
            progress.report(RebuildProgressEvent::Page {
                page: report.pages,
                ids: report.ids_seen,
                indexed: report.indexed,
            });
        }
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(())
}

/// Process the page after `cursor`. Returns the cursor for the next page,
/// or `None` when this was the last one.
async fn sync_page(
    index: &dyn SearchIndex,
    source: &dyn ProjectSource,
    opts: &RebuildOptions,
    cursor: Option<&Cursor>,
    report: &mut SyncReport,
) -> std::result::Result<Option<Cursor>, StageFailure> {
    let page = next_page(source, cursor, opts.page_size)
        .await
        .at(SyncStage::Paging)?;
    if page.is_empty() {
        debug!(after = ?cursor.map(|c| c.last_id()), "no more eligible projects");
        return Ok(None);
    }
    report.pages += 1;
    report.ids_seen += page.ids.len() as u64;

    let hydrated = source.hydrate(&page.ids).await.at(SyncStage::Hydrating)?;

    let mut documents: Vec<SearchDocument> = Vec::with_capacity(hydrated.len());
    for project in hydrated {
        let Some(project) = project else {
            report.missing += 1;
            continue;
        };
        if !(opts.eligible)(project.visibility, project.status) {
            report.rejected += 1;
            continue;
        }
        documents.push(format_search_document(&project, &opts.urls));
    }

    if !documents.is_empty() {
        let task = index
            .add_documents(&documents)
            .await
            .at(SyncStage::Submitting)?;
        let outcome = await_task(index, task, opts.task_wait)
            .await
            .at(SyncStage::Awaiting)?;
        if outcome.timed_out() {
            report.await_timeouts += 1;
        }
        report.submitted += documents.len() as u64;
        if outcome.unsuccessful().is_empty() {
            report.indexed += documents.len() as u64;
        } else {
            report.failed_tasks += 1;
        }
    }

    debug!(
        page = report.pages,
        ids = page.ids.len(),
        submitted = documents.len(),
        "page synced"
    );

    if documents.len() < opts.page_size {
        if page.ids.len() == opts.page_size {
            warn!(
                page = report.pages,
                submitted = documents.len(),
                page_size = opts.page_size,
                "page came back short after filtering; stopping rebuild here"
            );
        }
        return Ok(None);
    }
    Ok(page.next_cursor)
}

/// CLI entry point: rebuild the configured index from the configured store
/// and print a summary. Returns the report; the rebuild itself never errors.
pub async fn run_rebuild(
    config: &Config,
    progress: &dyn RebuildProgressReporter,
) -> SyncReport {
    let report = match connect(config).await {
        Ok((index, source)) => {
            let opts = RebuildOptions::from_config(config);
            let report = rebuild_index(&index, &source, &opts, progress)
                .instrument(rebuild_span(&config.index.uid))
                .await;
            source.close().await;
            report
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, "index rebuild could not start");
            SyncReport::failed(SyncStage::Connecting, &e)
        }
    };

    println!("rebuild {}", config.index.uid);
    println!("  pages: {}", report.pages);
    println!("  ids seen: {}", report.ids_seen);
    println!("  missing on hydrate: {}", report.missing);
    println!("  rejected: {}", report.rejected);
    println!("  documents submitted: {}", report.submitted);
    println!("  documents indexed: {}", report.indexed);
    println!("  await timeouts: {}", report.await_timeouts);
    println!("  failed tasks: {}", report.failed_tasks);
    match &report.outcome {
        SyncOutcome::Completed => println!("ok"),
        SyncOutcome::Failed { stage, error } => println!("failed ({}): {}", stage, error),
    }

    report
}

async fn connect(config: &Config) -> Result<(MeiliIndex, SqliteProjectSource)> {
    let index = MeiliIndex::from_config(&config.index)?;
    let pool = db::connect(config).await?;
    Ok((index, SqliteProjectSource::new(pool)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use search_sync_core::index::memory::{InMemoryIndex, TaskLifecycle};
    use search_sync_core::index::TaskStatus;
    use search_sync_core::models::{PublishingStatus, Visibility};
    use search_sync_core::source::memory::{sample_project, InMemoryProjectSource};
    use std::sync::Mutex;
    use std::time::Duration;

    fn opts(page_size: usize) -> RebuildOptions {
        RebuildOptions {
            page_size,
            task_wait: WaitPolicy::new(Duration::from_millis(100), Duration::from_millis(10_000)),
            tasks_wait: WaitPolicy::new(Duration::from_millis(100), Duration::from_millis(30_000)),
            settings: IndexSettings::projects(),
            urls: MediaUrls::new("https://cdn.test"),
            eligible: is_project_indexable,
        }
    }

    fn id(i: usize) -> String {
        format!("p{:05}", i)
    }

    fn source_with(n: usize) -> InMemoryProjectSource {
        let source = InMemoryProjectSource::new();
        for i in 0..n {
            source.insert(sample_project(&id(i)));
        }
        source
    }

    fn listed_only(visibility: Visibility, status: PublishingStatus) -> bool {
        visibility == Visibility::Listed && status == PublishingStatus::Approved
    }

    struct Recorder(Mutex<Vec<RebuildProgressEvent>>);

    impl RebuildProgressReporter for Recorder {
        fn report(&self, event: RebuildProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn pages_until_a_short_page() {
        let source = source_with(2500);
        let index = InMemoryIndex::new();

        let report = rebuild_index(&index, &source, &opts(1000), &NoProgress).await;

        assert!(report.is_success());
        let requests = source.page_requests();
        assert_eq!(requests.len(), 3);
        let returned: Vec<usize> = requests.iter().map(|r| r.returned).collect();
        assert_eq!(returned, vec![1000, 1000, 500]);
        assert_eq!(requests[0].after, None);
        assert_eq!(requests[1].after, Some(id(999)));
        assert_eq!(requests[2].after, Some(id(1999)));

        assert_eq!(index.add_batches(), vec![1000, 1000, 500]);
        assert_eq!(index.document_count().await.unwrap(), 2500);
        assert_eq!(report.pages, 3);
        assert_eq!(report.indexed, 2500);
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let source = source_with(2000);
        let index = InMemoryIndex::new();

        let report = rebuild_index(&index, &source, &opts(1000), &NoProgress).await;

        assert!(report.is_success());
        let returned: Vec<usize> = source.page_requests().iter().map(|r| r.returned).collect();
        assert_eq!(returned, vec![1000, 1000, 0]);
        assert_eq!(report.indexed, 2000);
    }

    #[tokio::test]
    async fn short_page_after_filtering_stops_the_run() {
        let source = source_with(3000);
        // 400 projects in the second page fail secondary eligibility
        for i in 1000..1400 {
            let mut p = sample_project(&id(i));
            p.visibility = Visibility::Archived;
            source.insert(p);
        }
        let index = InMemoryIndex::new();
        let mut opts = opts(1000);
        opts.eligible = listed_only;

        let report = rebuild_index(&index, &source, &opts, &NoProgress).await;

        assert!(report.is_success());
        assert_eq!(source.page_requests().len(), 2);
        assert_eq!(index.add_batches(), vec![1000, 600]);
        assert_eq!(report.rejected, 400);
        assert_eq!(report.indexed, 1600);
        // the third page of eligible projects is left for the next rebuild
        assert_eq!(index.document_count().await.unwrap(), 1600);
    }

    #[tokio::test]
    async fn missing_record_shortens_page_and_stops() {
        let source = source_with(5);
        source.vanish(&id(1));
        let index = InMemoryIndex::new();

        let report = rebuild_index(&index, &source, &opts(2), &NoProgress).await;

        // p00000 indexed, p00001 missing: a short page ends the run
        assert!(report.is_success());
        assert_eq!(report.missing, 1);
        assert_eq!(report.indexed, 1);
        assert_eq!(source.page_requests().len(), 1);
    }

    #[tokio::test]
    async fn hydration_gaps_are_skipped() {
        let source = source_with(10);
        source.vanish(&id(3));
        source.vanish(&id(7));
        let index = InMemoryIndex::new();

        let report = rebuild_index(&index, &source, &opts(1000), &NoProgress).await;

        assert!(report.is_success());
        assert_eq!(report.missing, 2);
        let ids: Vec<String> = index.documents().into_iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), 8);
        assert!(!ids.contains(&id(3)));
    }

    #[tokio::test]
    async fn empty_store_only_provisions() {
        let source = InMemoryProjectSource::new();
        let index = InMemoryIndex::new();
        index.seed(format_search_document(
            &sample_project("stale"),
            &MediaUrls::new("https://cdn.test"),
        ));

        let report = rebuild_index(&index, &source, &opts(1000), &NoProgress).await;

        assert!(report.is_success());
        assert_eq!(report.pages, 0);
        assert_eq!(index.document_count().await.unwrap(), 0);
        assert_eq!(index.settings().await.unwrap(), IndexSettings::projects());
        assert!(index.add_batches().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_is_reported_not_raised() {
        let source = source_with(2500);
        let index = InMemoryIndex::new();
        index.fail_add_documents_on(2);

        let report = rebuild_index(&index, &source, &opts(1000), &NoProgress).await;

        match &report.outcome {
            SyncOutcome::Failed { stage, error } => {
                assert_eq!(*stage, SyncStage::Submitting);
                assert!(error.contains("503"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(report.indexed, 1000);
        assert_eq!(source.page_requests().len(), 2);
    }

    #[tokio::test]
    async fn hydration_failure_is_reported_not_raised() {
        let source = source_with(10);
        source.fail_hydration();
        let index = InMemoryIndex::new();

        let report = rebuild_index(&index, &source, &opts(1000), &NoProgress).await;

        assert!(matches!(
            report.outcome,
            SyncOutcome::Failed {
                stage: SyncStage::Hydrating,
                ..
            }
        ));
        assert_eq!(report.indexed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn await_timeouts_do_not_stop_the_run() {
        let source = source_with(3);
        let index = InMemoryIndex::new();
        index.set_lifecycle(TaskLifecycle::Stuck);

        let report = rebuild_index(&index, &source, &opts(2), &NoProgress).await;

        assert!(report.is_success());
        assert!(report.provision_timed_out);
        assert_eq!(report.await_timeouts, 2);
        assert_eq!(report.indexed, 3);
    }

    #[tokio::test]
    async fn failed_tasks_do_not_stop_the_run() {
        let source = source_with(3);
        let index = InMemoryIndex::new();
        index.set_lifecycle(TaskLifecycle::AfterPolls {
            polls: 0,
            terminal: TaskStatus::Failed,
        });

        let report = rebuild_index(&index, &source, &opts(2), &NoProgress).await;

        assert!(report.is_success());
        assert_eq!(report.submitted, 3);
        assert_eq!(report.indexed, 0);
        assert_eq!(report.failed_tasks, 2);
    }

    #[tokio::test]
    async fn rejected_batch_is_not_counted_as_indexed() {
        let source = source_with(3);
        let index = InMemoryIndex::new();
        let opts = opts(2);
        let first = sync_page(&index, &source, &opts, None, &mut SyncReport::new())
            .await
            .ok()
            .flatten();
        assert_eq!(first, Some(Cursor::after(id(1))));

        index.set_lifecycle(TaskLifecycle::AfterPolls {
            polls: 0,
            terminal: TaskStatus::Canceled,
        });
        let mut report = SyncReport::new();
        let next = sync_page(&index, &source, &opts, first.as_ref(), &mut report)
            .await
            .ok()
            .flatten();

        assert_eq!(next, None);
        assert_eq!(report.submitted, 1);
        assert_eq!(report.indexed, 0);
        assert_eq!(report.failed_tasks, 1);
    }

    #[tokio::test]
    async fn reports_progress_per_page() {
        let source = source_with(3);
        let index = InMemoryIndex::new();
        let recorder = Recorder(Mutex::new(Vec::new()));

        rebuild_index(&index, &source, &opts(2), &recorder).await;

        let events = recorder.0.into_inner().unwrap();
        assert_eq!(
            events,
            vec![
                RebuildProgressEvent::Provisioning,
                RebuildProgressEvent::Page {
                    page: 1,
                    ids: 2,
                    indexed: 2
                },
                RebuildProgressEvent::Page {
                    page: 2,
                    ids: 3,
                    indexed: 3
                },
                RebuildProgressEvent::Finished { indexed: 3 },
            ]
        );
    }
}
