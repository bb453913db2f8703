//! Bounded waiting on index tasks.
//!
//! Index writes are asynchronous: a submission returns a task handle and
//! the index applies the change later. The functions here poll task status
//! at a fixed interval until nothing is left enqueued or processing, or
//! until the policy's timeout is used up.
//!
//! Waiting is advisory. A timeout or a `failed` / `canceled` terminal status
//! is reported in the returned [`WaitOutcome`] and logged, never returned as
//! an error. Only a failure to *query* the index is an error.
//!
//! Elapsed time is the sum of poll sleeps; the time spent on the status
//! requests themselves is not counted.

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};

use search_sync_core::index::{AsyncTask, SearchIndex, TaskStatus, TaskUid};

/// Poll interval and total wait budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every task reached a terminal status.
    Settled(Vec<AsyncTask>),
    /// The budget ran out while some task was still pending.
    TimedOut { waited: Duration },
}

impl WaitOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut { .. })
    }

    /// Terminal tasks that did not succeed.
    pub fn unsuccessful(&self) -> Vec<AsyncTask> {
        match self {
            WaitOutcome::Settled(tasks) => tasks
                .iter()
                .filter(|t| t.status != TaskStatus::Succeeded)
                .copied()
                .collect(),
            WaitOutcome::TimedOut { .. } => Vec::new(),
        }
    }
}

/// Poll one task until it leaves `enqueued` / `processing`.
pub async fn await_task(
    index: &dyn SearchIndex,
    task: AsyncTask,
    policy: WaitPolicy,
) -> Result<WaitOutcome> {
    let mut waited = Duration::ZERO;

    loop {
        let current = index.get_task(task.uid).await?;
        if !current.status.is_pending() {
            if current.status != TaskStatus::Succeeded {
                warn!(
                    task = current.uid,
                    status = current.status.as_str(),
                    "index task finished unsuccessfully"
                );
            }
            return Ok(WaitOutcome::Settled(vec![current]));
        }

        tokio::time::sleep(policy.poll_interval).await;
        waited += policy.poll_interval;

        if waited >= policy.timeout {
            warn!(
                task = task.uid,
                timeout_ms = policy.timeout.as_millis() as u64,
                "index task took too long to process, gave up waiting"
            );
            return Ok(WaitOutcome::TimedOut { waited });
        }
    }
}

/// Poll a group of tasks, one batched status request per tick, until none
/// of them is pending.
pub async fn await_tasks(
    index: &dyn SearchIndex,
    tasks: &[AsyncTask],
    policy: WaitPolicy,
) -> Result<WaitOutcome> {
    let uids: Vec<TaskUid> = tasks.iter().map(|t| t.uid).collect();
    if uids.is_empty() {
        return Ok(WaitOutcome::Settled(Vec::new()));
    }

    let mut waited = Duration::ZERO;

    loop {
        let current = index.get_tasks(&uids).await?;
        let pending = current.iter().filter(|t| t.status.is_pending()).count();
        if pending == 0 {
            for t in current.iter().filter(|t| t.status != TaskStatus::Succeeded) {
                warn!(
                    task = t.uid,
                    status = t.status.as_str(),
                    "index task finished unsuccessfully"
                );
            }
            return Ok(WaitOutcome::Settled(current));
        }
        debug!(pending, total = uids.len(), "waiting on index tasks");

        tokio::time::sleep(policy.poll_interval).await;
        waited += policy.poll_interval;

        if waited >= policy.timeout {
            warn!(
                tasks = ?uids,
                timeout_ms = policy.timeout.as_millis() as u64,
                "index tasks took too long to process, gave up waiting"
            );
            return Ok(WaitOutcome::TimedOut { waited });
        }
    }
}
