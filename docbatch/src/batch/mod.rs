//! Chunked task execution.
//!
//! [`BatchScheduler::run_batch`] splits a task list into consecutive chunks
//! of `concurrency` tasks. Every task of a chunk starts at once, and the next
//! chunk starts only after the whole chunk has settled. Results are written
//! back to their input position. A task that fails or panics becomes a
//! failed [`TaskResult`] and never disturbs its neighbours.
//!
//! Skipping happens before scheduling, in [`BatchScheduler::plan`].

use futures::FutureExt;
use futures::future::join_all;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Config;
use crate::context::{RunContext, RunEvent, SkipReason};
use crate::error::Result;
use crate::summary::{Task, TaskResult};

/// Tasks split into those to run and those left out.
#[derive(Debug, Default)]
pub struct Plan {
    /// Tasks to schedule, in input order.
    pub run: Vec<Task>,
    /// Tasks excluded before scheduling.
    pub skipped: Vec<(Task, SkipReason)>,
}

/// Runs tasks in bounded sequential chunks.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    concurrency: usize,
    retry: u32,
    overwrite: bool,
    incremental: bool,
    context: RunContext,
}

impl BatchScheduler {
    /// Scheduler with the given chunk size and no retries.
    pub fn new(concurrency: usize, context: RunContext) -> Self {
        Self {
            concurrency: concurrency.max(1),
            retry: 0,
            overwrite: false,
            incremental: false,
            context,
        }
    }

    /// Scheduler using `options.concurrent`, `options.overwrite`,
    /// `features.retry`, and `features.incremental`.
    pub fn from_config(config: &Config, context: RunContext) -> Self {
        Self::new(config.options.concurrent, context)
            .with_retry(config.features.retry)
            .with_skip_policy(config.options.overwrite, config.features.incremental)
    }

    /// Extra attempts for a failed task.
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// How existing outputs are treated by [`plan`](Self::plan).
    pub fn with_skip_policy(mut self, overwrite: bool, incremental: bool) -> Self {
        self.overwrite = overwrite;
        self.incremental = incremental;
        self
    }

    /// Tasks in flight per chunk.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Decide which tasks run.
    ///
    /// A task whose output does not exist always runs. With incremental
    /// rebuilds on, an existing output is kept only while it is not older
    /// than its source. Otherwise an existing output is kept unless
    /// overwrite is on.
    pub async fn plan(&self, tasks: Vec<Task>) -> Plan {
        let mut plan = Plan::default();

        for task in tasks {
            let exists = tokio::fs::try_exists(&task.target).await.unwrap_or(false);

            let skip = if !exists {
                None
            } else if self.incremental {
                (!needs_rebuild(&task.source, &task.target).await).then_some(SkipReason::UpToDate)
            } else if !self.overwrite {
                Some(SkipReason::OutputExists)
            } else {
                None
            };

            match skip {
                Some(reason) => {
                    tracing::debug!(source = %task.source.display(), ?reason, "skipping task");
                    self.context.emit(RunEvent::TaskSkipped {
                        source: task.source.clone(),
                        reason,
                    });
                    plan.skipped.push((task, reason));
                }
                None => plan.run.push(task),
            }
        }

        plan
    }

    /// Run every task, one chunk at a time.
    ///
    /// `execute` returns the output path on success. The returned results
    /// line up with `tasks` by index.
    pub async fn run_batch<F, Fut>(&self, tasks: &[Task], execute: F) -> Vec<TaskResult>
    where
        F: Fn(&Task) -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        let mut results: Vec<Option<TaskResult>> = vec![None; tasks.len()];
        let chunks = tasks.len().div_ceil(self.concurrency);

        for (chunk_index, chunk) in tasks.chunks(self.concurrency).enumerate() {
            let base = chunk_index * self.concurrency;
            tracing::debug!(chunk = chunk_index + 1, of = chunks, size = chunk.len(), "starting chunk");

            let settled = join_all(chunk.iter().enumerate().map(|(offset, task)| {
                let execute = &execute;
                async move { (base + offset, self.run_one(task, execute).await) }
            }))
            .await;

            for (index, result) in settled {
                results[index] = Some(result);
            }
        }

        results.into_iter().flatten().collect()
    }

    async fn run_one<F, Fut>(&self, task: &Task, execute: &F) -> TaskResult
    where
        F: Fn(&Task) -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        self.context.emit(RunEvent::TaskStarted {
            source: task.source.clone(),
        });

        let started = Instant::now();
        let mut attempt = 0;

        let result = loop {
            let outcome = AssertUnwindSafe(async { execute(task).await })
                .catch_unwind()
                .await;

            let error = match outcome {
                Ok(Ok(output)) => break TaskResult::ok(&task.source, output, started.elapsed()),
                Ok(Err(err)) => err.to_string(),
                Err(panic) => format!("task panicked: {}", panic_message(panic.as_ref())),
            };

            if attempt >= self.retry {
                tracing::warn!(source = %task.source.display(), %error, "task failed");
                break TaskResult::failed(&task.source, error, started.elapsed());
            }

            attempt += 1;
            tracing::info!(
                source = %task.source.display(),
                attempt,
                of = self.retry,
                %error,
                "retrying task"
            );
        };

        self.context.emit(RunEvent::TaskFinished {
            source: task.source.clone(),
            success: result.success,
            duration_ms: result.duration_ms,
        });
        result
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Whether `output` must be regenerated from `source`.
///
/// False only when both files can be read and the output's modification
/// time is not older than the source's. Any stat failure means yes.
pub async fn needs_rebuild(source: &Path, output: &Path) -> bool {
    let (Ok(source_meta), Ok(output_meta)) = (
        tokio::fs::metadata(source).await,
        tokio::fs::metadata(output).await,
    ) else {
        return true;
    };

    match (source_meta.modified(), output_meta.modified()) {
        (Ok(source_time), Ok(output_time)) => output_time < source_time,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocBatchError;
    use crate::summary::TaskKind;
    use std::fs::File;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use tokio::time::sleep;

    fn task(name: &str) -> Task {
        Task {
            source: PathBuf::from(name),
            target: PathBuf::from(format!("{name}.pdf")),
            kind: TaskKind::Convert,
        }
    }

    fn tasks(n: usize) -> Vec<Task> {
        (0..n).map(|i| task(&format!("t{i}"))).collect()
    }

    #[tokio::test]
    async fn test_concurrency_bound_and_chunk_barrier() {
        let scheduler = BatchScheduler::new(2, RunContext::new());
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let log = Mutex::new(Vec::new());

        let results = scheduler
            .run_batch(&tasks(4), |task| {
                let name = task.source.display().to_string();
                let (in_flight, peak, log) = (&in_flight, &peak, &log);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    log.lock().unwrap().push(format!("start {name}"));

                    let delay = if name == "t0" { 40 } else { 5 };
                    sleep(Duration::from_millis(delay)).await;

                    log.lock().unwrap().push(format!("end {name}"));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(PathBuf::from(format!("{name}.pdf")))
                }
            })
            .await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(peak.load(Ordering::SeqCst), 2);

        let log = log.into_inner().unwrap();
        let position = |entry: &str| log.iter().position(|e| e == entry).unwrap();
        assert!(position("start t2") > position("end t0"));
        assert!(position("start t2") > position("end t1"));
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let scheduler = BatchScheduler::new(3, RunContext::new());
        let results = scheduler
            .run_batch(&tasks(5), |task| {
                let name = task.source.display().to_string();
                async move {
                    // Later tasks finish first inside each chunk.
                    let index: u64 = name.trim_start_matches('t').parse().unwrap();
                    sleep(Duration::from_millis(30 - index * 5)).await;
                    Ok(PathBuf::from(format!("{name}.pdf")))
                }
            })
            .await;

        let sources: Vec<_> = results.iter().map(|r| r.source.clone()).collect();
        assert_eq!(sources, tasks(5).into_iter().map(|t| t.source).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failure_and_panic_are_isolated() {
        let scheduler = BatchScheduler::new(3, RunContext::new());
        let results = scheduler
            .run_batch(&tasks(3), |task| {
                let name = task.source.display().to_string();
                async move {
                    match name.as_str() {
                        "t0" => Err(DocBatchError::render(&name, "bad input")),
                        "t1" => panic!("renderer exploded"),
                        _ => Ok(PathBuf::from("t2.pdf")),
                    }
                }
            })
            .await;

        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("bad input"));
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("renderer exploded"));
        assert!(results[2].success);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let attempts = AtomicUsize::new(0);
        let run = |retry| {
            attempts.store(0, Ordering::SeqCst);
            let scheduler = BatchScheduler::new(1, RunContext::new()).with_retry(retry);
            let attempts = &attempts;
            async move {
                scheduler
                    .run_batch(&tasks(1), |_| async move {
                        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(DocBatchError::other("flaky"))
                        } else {
                            Ok(PathBuf::from("t0.pdf"))
                        }
                    })
                    .await
            }
        };

        let results = run(1).await;
        assert!(!results[0].success);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let results = run(2).await;
        assert!(results[0].success);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (context, mut rx) = RunContext::with_events();
        let scheduler = BatchScheduler::new(2, context);
        scheduler
            .run_batch(&tasks(1), |_| async { Ok(PathBuf::from("t0.pdf")) })
            .await;

        assert!(matches!(rx.try_recv().unwrap(), RunEvent::TaskStarted { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            RunEvent::TaskFinished { success: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let scheduler = BatchScheduler::new(3, RunContext::new());
        let results = scheduler
            .run_batch(&[], |_| async { Ok(PathBuf::new()) })
            .await;
        assert!(results.is_empty());
    }

    fn set_mtime(path: &Path, secs_ago: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
            .unwrap();
    }

    struct Pair {
        _dir: TempDir,
        source: PathBuf,
        output: PathBuf,
    }

    fn pair() -> Pair {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.md");
        let output = dir.path().join("a.pdf");
        std::fs::write(&source, "# a").unwrap();
        std::fs::write(&output, "%PDF").unwrap();
        Pair {
            _dir: dir,
            source,
            output,
        }
    }

    #[tokio::test]
    async fn test_needs_rebuild() {
        let files = pair();

        set_mtime(&files.source, 100);
        set_mtime(&files.output, 10);
        assert!(!needs_rebuild(&files.source, &files.output).await);

        set_mtime(&files.source, 5);
        assert!(needs_rebuild(&files.source, &files.output).await);

        std::fs::remove_file(&files.output).unwrap();
        assert!(needs_rebuild(&files.source, &files.output).await);
        assert!(needs_rebuild(Path::new("/nonexistent/a.md"), &files.source).await);
    }

    #[tokio::test]
    async fn test_needs_rebuild_equal_mtime_skips() {
        let files = pair();
        let when = SystemTime::now() - Duration::from_secs(60);
        for path in [&files.source, &files.output] {
            File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(when)
                .unwrap();
        }
        assert!(!needs_rebuild(&files.source, &files.output).await);
    }

    #[tokio::test]
    async fn test_plan_skip_policies() {
        let files = pair();
        set_mtime(&files.source, 5);
        set_mtime(&files.output, 100);
        let stale = Task {
            source: files.source.clone(),
            target: files.output.clone(),
            kind: TaskKind::Convert,
        };
        let fresh = Task {
            source: files.source.clone(),
            target: files.output.with_file_name("missing.pdf"),
            kind: TaskKind::Convert,
        };
        let both = vec![stale.clone(), fresh.clone()];

        let keep = BatchScheduler::new(1, RunContext::new());
        let plan = keep.plan(both.clone()).await;
        assert_eq!(plan.run, vec![fresh.clone()]);
        assert_eq!(plan.skipped, vec![(stale.clone(), SkipReason::OutputExists)]);

        let overwrite = BatchScheduler::new(1, RunContext::new()).with_skip_policy(true, false);
        assert_eq!(overwrite.plan(both.clone()).await.run.len(), 2);

        let incremental = BatchScheduler::new(1, RunContext::new()).with_skip_policy(false, true);
        assert_eq!(incremental.plan(both.clone()).await.run.len(), 2);

        set_mtime(&files.output, 1);
        let plan = incremental.plan(both).await;
        assert_eq!(plan.run, vec![fresh]);
        assert_eq!(plan.skipped, vec![(stale, SkipReason::UpToDate)]);
    }
}
