//! Transport-independent API layer.
//!
//! `EnhancerApi` is the single entry point for callers. Transports (HTTP,
//! CLI, direct embedding) call its methods and never reach into the
//! scheduler or job registry directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::runtime::Handle;

use crate::config::{ConfigError, EnhancerConfig};
use crate::content::ContentItem;
use crate::engine::EngineRegistry;
use crate::jobs::{JobError, JobId, JobRegistry, JobStatus, RunnableUnit};
use crate::plan::{ChainRegistry, DefaultChainBuilder, ExecutionPlanGraph};
use crate::scheduler::{CancellationToken, ChainScheduler, RunOutcome, RunResult, SchedulerError};

/// What a chain job left behind at its result location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub chain: String,
    pub item_uri: String,
    /// `None` when the run never started
    pub outcome: Option<RunOutcome>,
    pub error: Option<String>,
    pub result: Option<RunResult>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    fn new(job: &ChainJob, outcome: &Result<RunResult, SchedulerError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result.clone()), None),
            Err(e) => (e.run_result().cloned(), Some(e.to_string())),
        };
        Self {
            job_id: job.id,
            chain: job.plan.name().to_string(),
            item_uri: job.item.uri().to_string(),
            outcome: result.as_ref().map(|r| r.outcome),
            error,
            result,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs plans with the optional facade deadline applied.
#[derive(Clone)]
struct Runner {
    scheduler: Arc<ChainScheduler>,
    max_wait: Option<Duration>,
}

impl Runner {
    /// Run to completion, `cancel` firing, or the deadline passing,
    /// whichever comes first. The scheduler is always allowed to wind
    /// down so the partial result is reported.
    async fn execute(
        &self,
        item: &ContentItem,
        plan: &ExecutionPlanGraph,
        cancel: &CancellationToken,
    ) -> Result<RunResult, SchedulerError> {
        let run_token = CancellationToken::new();
        let run = self.scheduler.run_with_cancel(item, plan, &run_token);
        tokio::pin!(run);

        let deadline = async {
            match self.max_wait {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = &mut run => result,
            _ = cancel.cancelled() => {
                run_token.cancel();
                run.await
            }
            _ = deadline => {
                tracing::warn!(chain = plan.name(), item = item.uri(), "chain run exceeded its deadline");
                run_token.cancel();
                match run.await {
                    Err(SchedulerError::Cancelled { result }) => Err(SchedulerError::DeadlineExceeded {
                        // `deadline` only resolves when a limit is set
                        limit: self.max_wait.unwrap_or_default(),
                        result,
                    }),
                    other => other,
                }
            }
        }
    }
}

/// A chain run wrapped as a job.
struct ChainJob {
    id: JobId,
    description: String,
    location: String,
    item: ContentItem,
    plan: Arc<ExecutionPlanGraph>,
    runner: Runner,
    reports: Arc<DashMap<String, JobReport>>,
}

impl ChainJob {
    fn new(
        item: ContentItem,
        plan: Arc<ExecutionPlanGraph>,
        runner: Runner,
        reports: Arc<DashMap<String, JobReport>>,
        location_prefix: &str,
    ) -> Self {
        // Plans serialize deterministically (nodes are kept sorted)
        let plan_json = serde_json::to_string(plan.as_ref()).unwrap_or_else(|_| plan.name().to_string());
        let description = format!("chain={};item={};plan={}", plan.name(), item.uri(), plan_json);
        let id = JobId::for_description(&description);
        Self {
            id,
            description,
            location: format!("{location_prefix}{id}"),
            item,
            plan,
            runner,
            reports,
        }
    }
}

impl RunnableUnit for ChainJob {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn result_location(&self) -> String {
        self.location.clone()
    }

    fn run(self: Box<Self>, cancel: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let outcome = self.runner.execute(&self.item, &self.plan, &cancel).await;
            let report = JobReport::new(&self, &outcome);
            // Checked under the entry lock, which the facade holds while it
            // stops this job, so a stopped job never publishes.
            let entry = self.reports.entry(self.location.clone());
            if cancel.is_cancelled() {
                tracing::debug!(job_id = %self.id, "cancelled job leaves no report");
                return;
            }
            tracing::info!(job_id = %self.id, location = %self.location, success = report.is_success(), "job finished");
            entry.insert(report);
        })
    }
}

/// Single entry point for running chains and managing chain jobs.
#[derive(Clone)]
pub struct EnhancerApi {
    runner: Runner,
    chains: Arc<ChainRegistry>,
    builder: DefaultChainBuilder,
    jobs: Arc<JobRegistry>,
    reports: Arc<DashMap<String, JobReport>>,
    result_location_prefix: String,
}

impl EnhancerApi {
    /// Create an API over `engines` with default settings and no named chains.
    pub fn new(engines: Arc<dyn EngineRegistry>) -> Self {
        Self::with_scheduler(Arc::new(ChainScheduler::new(engines)), ChainRegistry::new())
    }

    pub fn with_scheduler(scheduler: Arc<ChainScheduler>, chains: ChainRegistry) -> Self {
        Self {
            runner: Runner {
                scheduler,
                max_wait: None,
            },
            chains: Arc::new(chains),
            builder: DefaultChainBuilder::new(),
            jobs: Arc::new(JobRegistry::new()),
            reports: Arc::new(DashMap::new()),
            result_location_prefix: "/jobs/".to_string(),
        }
    }

    /// Wire the API from configuration: worker pool size, deadline,
    /// result locations and named chains.
    pub fn from_config(engines: Arc<dyn EngineRegistry>, config: &EnhancerConfig) -> Result<Self, ConfigError> {
        let chains = config.build_chain_registry()?;
        let scheduler = ChainScheduler::new(engines).with_workers(config.workers);
        let mut api = Self::with_scheduler(Arc::new(scheduler), chains).with_max_wait(config.max_wait());
        api.result_location_prefix = config.result_location_prefix.clone();
        Ok(api)
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.runner.max_wait = max_wait;
        self
    }

    /// Run chain jobs on `runtime`, so jobs can be submitted from threads
    /// that are not inside a tokio runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.jobs = Arc::new(JobRegistry::with_runtime(runtime));
        self
    }

    pub fn scheduler(&self) -> &Arc<ChainScheduler> {
        &self.runner.scheduler
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    // --- Runs ---

    /// The plan used when a caller supplies none: the configured default
    /// chain if there is one, else a linear chain over the active engines.
    pub fn resolve_plan(&self, plan: Option<&ExecutionPlanGraph>) -> Result<Arc<ExecutionPlanGraph>, SchedulerError> {
        if let Some(plan) = plan {
            return Ok(Arc::new(plan.clone()));
        }
        if let Some(default) = self.chains.default_chain() {
            return Ok(default);
        }
        let engines = self.runner.scheduler.engines().list_active_engines();
        if engines.is_empty() {
            return Err(SchedulerError::NoEngines);
        }
        Ok(Arc::new(self.builder.build_default(engines)?))
    }

    /// Run `item` through `plan`, or through the default chain when absent.
    pub async fn run_chain(
        &self,
        item: &ContentItem,
        plan: Option<&ExecutionPlanGraph>,
    ) -> Result<RunResult, SchedulerError> {
        let plan = self.resolve_plan(plan)?;
        self.runner.execute(item, &plan, &CancellationToken::new()).await
    }

    /// Run `item` through a chain registered by name.
    pub async fn run_named_chain(&self, item: &ContentItem, name: &str) -> Result<RunResult, SchedulerError> {
        let plan = self
            .chains
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownChain(name.to_string()))?;
        self.runner.execute(item, &plan, &CancellationToken::new()).await
    }

    // --- Jobs ---

    /// Submit a chain run as a background job.
    ///
    /// The plan is resolved now, so a missing default chain is reported
    /// to the caller rather than stored as a failed job. Without a runtime
    /// (see [`EnhancerApi::with_runtime`]) this fails with
    /// [`SchedulerError::Job`].
    pub fn submit_chain_as_job(
        &self,
        item: ContentItem,
        plan: Option<&ExecutionPlanGraph>,
    ) -> Result<JobId, SchedulerError> {
        let plan = self.resolve_plan(plan)?;
        let job = ChainJob::new(
            item,
            plan,
            self.runner.clone(),
            self.reports.clone(),
            &self.result_location_prefix,
        );
        // The previous instance is stopped while its location is locked,
        // and its report, if any, goes with it.
        let stale = self.reports.entry(job.location.clone());
        let id = self.jobs.submit(Box::new(job))?;
        if let Entry::Occupied(report) = stale {
            report.remove();
        }
        Ok(id)
    }

    pub fn job_status(&self, id: &JobId) -> JobStatus {
        self.jobs.status_of(id)
    }

    pub fn job_result_location(&self, id: &JobId) -> Result<String, JobError> {
        self.jobs.result_location_of(id)
    }

    /// Report stored at a result location once its job finished.
    pub fn job_report(&self, location: &str) -> Option<JobReport> {
        self.reports.get(location).map(|r| r.value().clone())
    }

    pub fn cancel_job(&self, id: &JobId) -> Result<(), JobError> {
        let location = self.jobs.result_location_of(id)?;
        let report = self.reports.entry(location);
        self.jobs.cancel(id)?;
        if let Entry::Occupied(report) = report {
            report.remove();
        }
        Ok(())
    }

    pub fn list_jobs(&self) -> Vec<(JobId, JobStatus, String)> {
        self.jobs.list()
    }

    /// Cancel every job and drop all reports. Used at shutdown.
    pub fn evict_all_jobs(&self) -> usize {
        let evicted = self.jobs.evict_all();
        self.reports.clear();
        evicted
    }
}
