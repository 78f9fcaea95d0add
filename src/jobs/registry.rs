//! JobRegistry: id → running job bookkeeping behind one coarse lock

use super::id::JobId;
use crate::scheduler::CancellationToken;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("no tokio runtime available to run jobs")]
    NoRuntime,
}

/// Observable state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Not tracked (never submitted, cancelled, or evicted)
    Unknown,
    Running,
    Done,
}

/// A unit of work the registry can run and cancel.
pub trait RunnableUnit: Send + 'static {
    /// Canonical description; the job id is derived from it.
    fn describe(&self) -> String;

    /// Where the unit publishes its result.
    fn result_location(&self) -> String;

    /// Consume the unit into its future. `cancel` is signalled before the
    /// task is aborted.
    fn run(self: Box<Self>, cancel: CancellationToken) -> BoxFuture<'static, ()>;
}

struct Job {
    handle: JoinHandle<()>,
    token: CancellationToken,
    result_location: String,
    submitted_at: DateTime<Utc>,
}

impl Job {
    fn status(&self) -> JobStatus {
        if self.handle.is_finished() {
            JobStatus::Done
        } else {
            JobStatus::Running
        }
    }

    fn stop(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Tracks submitted jobs.
///
/// The map is only touched while holding its lock; spawning and
/// cancelling the underlying tasks happens after the lock is released.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Job>>,
    runtime: Option<Handle>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn jobs on `runtime` instead of the caller's runtime, so
    /// submission also works from threads outside any runtime.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            jobs: Mutex::default(),
            runtime: Some(runtime),
        }
    }

    fn runtime(&self) -> Result<Handle, JobError> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| JobError::NoRuntime),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `work` and track it.
    ///
    /// Jobs run on the registry's runtime if it has one, else on the
    /// caller's. Resubmitting a description that is still tracked stops
    /// the earlier job before the new one starts; the work runs again
    /// under the same id.
    pub fn submit(&self, work: Box<dyn RunnableUnit>) -> Result<JobId, JobError> {
        let runtime = self.runtime()?;
        let description = work.describe();
        let id = JobId::for_description(&description);
        let result_location = work.result_location();

        let previous = self.lock().remove(&id);
        if let Some(previous) = previous {
            tracing::info!(job_id = %id, "resubmitted job replaces running instance");
            previous.stop();
        }

        let token = CancellationToken::new();
        let handle = runtime.spawn(work.run(token.clone()));
        let job = Job {
            handle,
            token,
            result_location: result_location.clone(),
            submitted_at: Utc::now(),
        };
        let raced = self.lock().insert(id, job);
        if let Some(raced) = raced {
            raced.stop();
        }
        tracing::info!(job_id = %id, result_location = %result_location, description = %description, "job submitted");
        Ok(id)
    }

    pub fn status_of(&self, id: &JobId) -> JobStatus {
        self.lock().get(id).map(Job::status).unwrap_or(JobStatus::Unknown)
    }

    pub fn result_location_of(&self, id: &JobId) -> Result<String, JobError> {
        self.lock()
            .get(id)
            .map(|job| job.result_location.clone())
            .ok_or(JobError::NotFound(*id))
    }

    pub fn submitted_at(&self, id: &JobId) -> Option<DateTime<Utc>> {
        self.lock().get(id).map(|job| job.submitted_at)
    }

    /// Cancel a job and forget it.
    pub fn cancel(&self, id: &JobId) -> Result<(), JobError> {
        let job = self.lock().remove(id).ok_or(JobError::NotFound(*id))?;
        job.stop();
        tracing::info!(job_id = %id, "job cancelled");
        Ok(())
    }

    /// Cancel and forget every tracked job.
    pub fn evict_all(&self) -> usize {
        let evicted: Vec<(JobId, Job)> = self.lock().drain().collect();
        let count = evicted.len();
        for (_, job) in evicted {
            job.stop();
        }
        if count > 0 {
            tracing::info!(count, "evicted all jobs");
        }
        count
    }

    /// Tracked jobs as `(id, status, result location)`, sorted by id.
    pub fn list(&self) -> Vec<(JobId, JobStatus, String)> {
        let mut jobs: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, job)| (*id, job.status(), job.result_location.clone()))
            .collect();
        jobs.sort_by(|a, b| a.0.cmp(&b.0));
        jobs
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.evict_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Waits for `release` (or cancellation), then counts a completion.
    struct Gate {
        name: String,
        release: Arc<Notify>,
        finished: Arc<AtomicUsize>,
    }

    impl Gate {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                release: Arc::new(Notify::new()),
                finished: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl RunnableUnit for Gate {
        fn describe(&self) -> String {
            format!("gate:{}", self.name)
        }

        fn result_location(&self) -> String {
            format!("/jobs/{}", self.name)
        }

        fn run(self: Box<Self>, cancel: CancellationToken) -> BoxFuture<'static, ()> {
            Box::pin(async move {
                tokio::select! {
                    _ = self.release.notified() => {
                        self.finished.fetch_add(1, Ordering::SeqCst);
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        }
    }

    async fn wait_for(registry: &JobRegistry, id: &JobId, status: JobStatus) {
        for _ in 0..100 {
            if registry.status_of(id) == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached {status:?}");
    }

    #[tokio::test]
    async fn submit_tracks_location_and_status() {
        let registry = JobRegistry::new();
        let gate = Gate::new("a");
        let release = gate.release.clone();
        let id = registry.submit(Box::new(gate)).unwrap();

        assert_eq!(id, JobId::for_description("gate:a"));
        assert_eq!(registry.status_of(&id), JobStatus::Running);
        assert_eq!(registry.result_location_of(&id).unwrap(), "/jobs/a");
        assert!(registry.submitted_at(&id).is_some());

        release.notify_one();
        wait_for(&registry, &id, JobStatus::Done).await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn resubmission_reuses_id_and_cancels_previous() {
        let registry = JobRegistry::new();
        let first = Gate::new("a");
        let first_release = first.release.clone();
        let first_finished = first.finished.clone();
        let first_id = registry.submit(Box::new(first)).unwrap();

        let second = Gate::new("a");
        let second_release = second.release.clone();
        let second_finished = second.finished.clone();
        let second_id = registry.submit(Box::new(second)).unwrap();

        assert_eq!(first_id, second_id);
        assert_eq!(registry.len(), 1);

        second_release.notify_one();
        wait_for(&registry, &second_id, JobStatus::Done).await;
        assert_eq!(second_finished.load(Ordering::SeqCst), 1);

        first_release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(first_finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_not_found() {
        let registry = JobRegistry::new();
        let id = JobId::for_description("missing");
        assert_eq!(registry.cancel(&id), Err(JobError::NotFound(id)));
        assert_eq!(registry.result_location_of(&id), Err(JobError::NotFound(id)));
        assert_eq!(registry.status_of(&id), JobStatus::Unknown);
    }

    #[tokio::test]
    async fn cancel_forgets_job() {
        let registry = JobRegistry::new();
        let gate = Gate::new("a");
        let finished = gate.finished.clone();
        let release = gate.release.clone();
        let id = registry.submit(Box::new(gate)).unwrap();

        registry.cancel(&id).unwrap();
        assert_eq!(registry.status_of(&id), JobStatus::Unknown);
        assert!(registry.is_empty());

        release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn evict_all_empties_registry() {
        let registry = JobRegistry::new();
        let ids: Vec<JobId> = ["a", "b", "c"]
            .iter()
            .map(|n| registry.submit(Box::new(Gate::new(n))).unwrap())
            .collect();

        assert_eq!(registry.evict_all(), 3);
        assert!(registry.is_empty());
        for id in &ids {
            assert_eq!(registry.status_of(id), JobStatus::Unknown);
        }
    }

    #[tokio::test]
    async fn list_is_sorted_by_id() {
        let registry = JobRegistry::new();
        for n in ["x", "y", "z", "w"] {
            registry.submit(Box::new(Gate::new(n))).unwrap();
        }
        let listed = registry.list();
        assert_eq!(listed.len(), 4);
        assert!(listed.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(listed.iter().all(|(_, status, location)| {
            *status == JobStatus::Running && location.starts_with("/jobs/")
        }));
    }

    /// Always resubmits under the same id; each instance notes whether the
    /// one before it had already been stopped when it was started.
    struct Relay {
        tokens: Arc<Mutex<Vec<CancellationToken>>>,
        predecessor_stopped: Arc<Mutex<Vec<bool>>>,
    }

    impl RunnableUnit for Relay {
        fn describe(&self) -> String {
            "relay".to_string()
        }

        fn result_location(&self) -> String {
            "/jobs/relay".to_string()
        }

        fn run(self: Box<Self>, cancel: CancellationToken) -> BoxFuture<'static, ()> {
            let mut tokens = self.tokens.lock().unwrap();
            if let Some(previous) = tokens.last() {
                self.predecessor_stopped.lock().unwrap().push(previous.is_cancelled());
            }
            tokens.push(cancel.clone());
            Box::pin(async move { cancel.cancelled().await })
        }
    }

    #[tokio::test]
    async fn resubmission_stops_previous_before_starting_new() {
        let registry = JobRegistry::new();
        let tokens = Arc::new(Mutex::new(Vec::new()));
        let predecessor_stopped = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            registry
                .submit(Box::new(Relay {
                    tokens: tokens.clone(),
                    predecessor_stopped: predecessor_stopped.clone(),
                }))
                .unwrap();
        }
        assert_eq!(*predecessor_stopped.lock().unwrap(), vec![true, true]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn submit_outside_runtime_is_an_error() {
        let registry = JobRegistry::new();
        let err = registry.submit(Box::new(Gate::new("a"))).unwrap_err();
        assert_eq!(err, JobError::NoRuntime);
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_with_runtime_accepts_jobs_from_plain_threads() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let registry = JobRegistry::with_runtime(runtime.handle().clone());
        let gate = Gate::new("a");
        let release = gate.release.clone();
        let finished = gate.finished.clone();

        let id = registry.submit(Box::new(gate)).unwrap();
        release.notify_one();
        runtime.block_on(wait_for(&registry, &id, JobStatus::Done));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
