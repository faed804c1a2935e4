//! Sequential job queue owned by a session.
//!
//! Jobs run strictly in enqueue order, one at a time, on the caller's
//! thread. Each job receives a [`ReportProgress`] handle wired to the
//! host's progress indicator. A failing (or panicking) job is logged and
//! skipped; the rest of the queue still runs.

use std::collections::VecDeque;

use hostlink_shared::HostlinkError;
use tracing::{debug, error, info};

use crate::diagnostic::catch_panic;
use crate::host::ProgressIndicator;

/// Keyword arguments handed to a job.
pub type JobArgs = serde_json::Map<String, serde_json::Value>;

/// Error type a job may fail with.
pub type JobError = Box<dyn std::error::Error + Send + Sync>;

pub type JobResult = std::result::Result<(), JobError>;

/// A deferred unit of work. The progress handle is part of the signature.
pub type Work = Box<dyn FnOnce(&JobArgs, &mut dyn ReportProgress) -> JobResult>;

/// Progress sink passed to every running job.
pub trait ReportProgress {
    /// Report absolute completion, `0..=100`.
    fn report_progress(&mut self, percent: u8);
}

// ---------------------------------------------------------------------------
// ProgressTracker
// ---------------------------------------------------------------------------

/// Converts absolute percentages into incremental indicator steps.
///
/// Values above 100 are clamped. A report lower than the last one produces
/// no step and leaves the last value unchanged.
pub struct ProgressTracker<'a, P: ProgressIndicator + ?Sized> {
    indicator: &'a P,
    last: u8,
}

impl<'a, P: ProgressIndicator + ?Sized> ProgressTracker<'a, P> {
    pub fn new(indicator: &'a P) -> Self {
        Self { indicator, last: 0 }
    }

    pub fn last_reported(&self) -> u8 {
        self.last
    }
}

impl<P: ProgressIndicator + ?Sized> ReportProgress for ProgressTracker<'_, P> {
    fn report_progress(&mut self, percent: u8) {
        let percent = percent.min(100);
        let delta = percent.saturating_sub(self.last);
        if delta > 0 {
            self.indicator.step(delta);
            self.last = percent;
        }
    }
}

// ---------------------------------------------------------------------------
// Job / JobQueue
// ---------------------------------------------------------------------------

/// One queued item.
pub struct Job {
    pub name: String,
    pub args: JobArgs,
    work: Work,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A job that failed during [`JobQueue::drain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub name: String,
    pub error: String,
}

impl JobFailure {
    pub fn to_error(&self) -> HostlinkError {
        HostlinkError::Job(format!("'{}': {}", self.name, self.error))
    }
}

/// Summary of one [`JobQueue::drain`] call, in execution order.
#[derive(Debug, Default, Clone)]
pub struct DrainReport {
    pub completed: Vec<String>,
    pub failed: Vec<JobFailure>,
}

impl DrainReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Unbounded FIFO of [`Job`]s.
#[derive(Debug, Default)]
pub struct JobQueue {
    items: VecDeque<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail. Never runs it inline.
    pub fn enqueue<F>(&mut self, name: impl Into<String>, work: F, args: JobArgs)
    where
        F: FnOnce(&JobArgs, &mut dyn ReportProgress) -> JobResult + 'static,
    {
        let name = name.into();
        debug!(job = %name, pending = self.items.len(), "job enqueued");
        self.items.push_back(Job {
            name,
            args,
            work: Box::new(work),
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Names of pending jobs, head first.
    pub fn pending(&self) -> Vec<&str> {
        self.items.iter().map(|j| j.name.as_str()).collect()
    }

    /// Drop every pending job. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    /// Run every queued job to completion, head first.
    ///
    /// The progress indicator is begun before and ended after each job,
    /// whether it succeeds, fails or panics.
    pub fn drain<P: ProgressIndicator + ?Sized>(&mut self, indicator: &P) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(job) = self.items.pop_front() {
            let Job { name, args, work } = job;
            info!(job = %name, remaining = self.items.len(), "running job");

            indicator.begin(&name);
            let mut tracker = ProgressTracker::new(indicator);
            let outcome = catch_panic(|| work(&args, &mut tracker));
            indicator.end();

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(diagnostic) => {
                    debug!(job = %name, trace = %diagnostic.trace, "job panicked");
                    Some(format!("panicked: {}", diagnostic.message))
                }
            };

            match failure {
                None => {
                    debug!(job = %name, "job finished");
                    report.completed.push(name);
                }
                Some(error) => {
                    error!(job = %name, ?args, %error, "error while processing job");
                    report.failed.push(JobFailure { name, error });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::testing::RecordingHost;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Clone + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let log = Arc::clone(&log);
            move |s: &str| log.lock().expect("log lock").push(s.to_string())
        };
        (log, sink)
    }

    #[test]
    fn enqueue_never_runs_inline() {
        let (log, sink) = recorder();
        let mut queue = JobQueue::new();
        queue.enqueue(
            "a",
            move |_, _| {
                sink("a");
                Ok(())
            },
            JobArgs::new(),
        );
        assert_eq!(queue.len(), 1);
        assert!(log.lock().expect("log lock").is_empty());
    }

    #[test]
    fn drain_runs_items_in_fifo_order_despite_failures() {
        let host = RecordingHost::new();
        let (log, sink) = recorder();
        let mut queue = JobQueue::new();

        for name in ["A", "B", "C"] {
            let sink = sink.clone();
            queue.enqueue(
                name,
                move |_, _| {
                    sink(name);
                    if name == "B" {
                        return Err("B exploded".into());
                    }
                    Ok(())
                },
                JobArgs::new(),
            );
        }

        let report = queue.drain(&host);
        assert_eq!(*log.lock().expect("log lock"), ["A", "B", "C"]);
        assert_eq!(report.completed, ["A", "C"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "B");
        assert!(queue.is_empty());
    }

    #[test]
    fn failing_item_does_not_block_the_next_one() {
        let host = RecordingHost::new();
        let (log, sink) = recorder();
        let mut queue = JobQueue::new();

        queue.enqueue("broken", |_, _| Err("disk full".into()), JobArgs::new());
        queue.enqueue(
            "publish",
            move |_, _| {
                sink("published");
                Ok(())
            },
            JobArgs::new(),
        );

        let report = queue.drain(&host);
        assert_eq!(*log.lock().expect("log lock"), ["published"]);
        assert_eq!(
            report.failed,
            [JobFailure {
                name: "broken".into(),
                error: "disk full".into()
            }]
        );
        assert_eq!(report.total(), 2);

        let err = report.failed[0].to_error();
        assert_eq!(err.kind(), "Job");
        assert_eq!(err.to_string(), "job error: 'broken': disk full");
    }

    #[test]
    fn panicking_item_is_isolated_and_progress_is_closed() {
        let host = RecordingHost::new();
        let mut queue = JobQueue::new();
        queue.enqueue("panics", |_, _| panic!("unexpected state"), JobArgs::new());
        queue.enqueue("fine", |_, _| Ok(()), JobArgs::new());

        let report = queue.drain(&host);
        assert_eq!(report.completed, ["fine"]);
        assert!(report.failed[0].error.contains("unexpected state"));
        assert_eq!(
            host.progress_events(),
            ["begin:panics", "end", "begin:fine", "end"]
        );
    }

    #[test]
    fn progress_reports_become_deltas() {
        let host = RecordingHost::new();
        let mut queue = JobQueue::new();
        queue.enqueue(
            "cache",
            |_, progress| {
                progress.report_progress(0);
                progress.report_progress(40);
                progress.report_progress(100);
                Ok(())
            },
            JobArgs::new(),
        );

        queue.drain(&host);
        assert_eq!(
            host.progress_events(),
            ["begin:cache", "step:40", "step:60", "end"]
        );
    }

    #[test]
    fn progress_resets_for_each_item() {
        let host = RecordingHost::new();
        let mut queue = JobQueue::new();
        for name in ["one", "two"] {
            queue.enqueue(
                name,
                |_, progress| {
                    progress.report_progress(50);
                    Ok(())
                },
                JobArgs::new(),
            );
        }

        queue.drain(&host);
        assert_eq!(
            host.progress_events(),
            ["begin:one", "step:50", "end", "begin:two", "step:50", "end"]
        );
    }

    #[test]
    fn tracker_ignores_regressions_and_clamps() {
        let host = RecordingHost::new();
        let mut tracker = ProgressTracker::new(&host);
        tracker.report_progress(60);
        tracker.report_progress(30);
        assert_eq!(tracker.last_reported(), 60);
        tracker.report_progress(250);
        assert_eq!(tracker.last_reported(), 100);
        assert_eq!(host.progress_events(), ["step:60", "step:40"]);
    }

    #[test]
    fn jobs_receive_their_arguments() {
        let host = RecordingHost::new();
        let (log, sink) = recorder();
        let mut queue = JobQueue::new();
        let mut args = JobArgs::new();
        args.insert("frames".into(), serde_json::json!(24));

        queue.enqueue(
            "playblast",
            move |args, _| {
                let frames = args
                    .get("frames")
                    .and_then(|v| v.as_u64())
                    .ok_or("missing frames")?;
                sink(&format!("frames={frames}"));
                Ok(())
            },
            args,
        );

        let report = queue.drain(&host);
        assert!(report.failed.is_empty());
        assert_eq!(*log.lock().expect("log lock"), ["frames=24"]);
    }

    #[test]
    fn clear_discards_pending_jobs() {
        let mut queue = JobQueue::new();
        queue.enqueue("a", |_, _| Ok(()), JobArgs::new());
        queue.enqueue("b", |_, _| Ok(()), JobArgs::new());
        assert_eq!(queue.pending(), ["a", "b"]);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
