//! ChainScheduler: the coordinating loop for one chain execution

use super::cancel::CancellationToken;
use super::result::{ChainFailure, NodeOutcome, RunOutcome, RunResult, SchedulerError};
use super::state::NodeRunState;
use crate::content::ContentItem;
use crate::engine::{Capability, Engine, EngineError, EngineRegistry};
use crate::plan::{ExecutionPlanGraph, NodeId};
use chrono::Utc;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default size of the worker pool for asynchronous engines.
pub const DEFAULT_WORKERS: usize = 4;

type WorkerOutput = (NodeId, Result<(), EngineError>);

/// Runs content items through execution plans.
///
/// One scheduler can serve many concurrent runs: per-run state lives in
/// the `run` call, and the worker pool bound is shared across them.
pub struct ChainScheduler {
    engines: Arc<dyn EngineRegistry>,
    workers: Arc<Semaphore>,
    worker_limit: usize,
}

impl ChainScheduler {
    pub fn new(engines: Arc<dyn EngineRegistry>) -> Self {
        Self {
            engines,
            workers: Arc::new(Semaphore::new(DEFAULT_WORKERS)),
            worker_limit: DEFAULT_WORKERS,
        }
    }

    /// Set the number of asynchronous engine invocations allowed at once.
    pub fn with_workers(mut self, limit: usize) -> Self {
        let limit = limit.max(1);
        self.workers = Arc::new(Semaphore::new(limit));
        self.worker_limit = limit;
        self
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    pub fn engines(&self) -> &Arc<dyn EngineRegistry> {
        &self.engines
    }

    /// Run `item` through `plan` to completion.
    pub async fn run(&self, item: &ContentItem, plan: &ExecutionPlanGraph) -> Result<RunResult, SchedulerError> {
        self.run_with_cancel(item, plan, &CancellationToken::new()).await
    }

    /// Run `item` through `plan`, observing `cancel`.
    ///
    /// Returns the run result when no required node failed (`Success` or
    /// `PartialFailure`). A required failure yields
    /// [`SchedulerError::ChainFailure`] once every unrelated branch has
    /// finished; cancellation yields [`SchedulerError::Cancelled`].
    pub async fn run_with_cancel(
        &self,
        item: &ContentItem,
        plan: &ExecutionPlanGraph,
        cancel: &CancellationToken,
    ) -> Result<RunResult, SchedulerError> {
        tracing::info!(chain = plan.name(), item = item.uri(), nodes = plan.len(), "chain run started");

        let mut run = Execution::new(plan, item);
        let mut workers: JoinSet<WorkerOutput> = JoinSet::new();

        loop {
            if cancel.is_cancelled() {
                run.cancel_unstarted();
            }

            while let Some(id) = run.next_ready() {
                self.dispatch(&mut run, id, &mut workers, cancel).await;
                if cancel.is_cancelled() {
                    run.cancel_unstarted();
                }
            }

            if workers.is_empty() {
                break;
            }

            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok((id, result))) => run.finish(&id, result),
                    Some(Err(e)) => tracing::error!(chain = plan.name(), error = %e, "worker task lost"),
                    None => {}
                },
                _ = cancel.cancelled(), if !run.cancelled => run.cancel_unstarted(),
            }
        }

        run.into_result()
    }

    /// Probe one ready node and start it inline, in the pool, or skip it.
    async fn dispatch(
        &self,
        run: &mut Execution<'_>,
        id: NodeId,
        workers: &mut JoinSet<WorkerOutput>,
        cancel: &CancellationToken,
    ) {
        let plan = run.plan;
        let Some(node) = plan.node(&id) else {
            return;
        };
        run.dispatch_order.push(id.clone());
        tracing::debug!(chain = plan.name(), node = %id, engine = %node.engine, "dispatching node");

        let Some(engine) = self.engines.resolve_engine(&node.engine) else {
            if node.optional {
                run.skip(&id, format!("engine '{}' is not registered", node.engine));
            } else {
                run.start(&id, None);
                run.finish(&id, Err(EngineError::NotFound(node.engine.clone())));
            }
            return;
        };

        match engine.probe(run.item) {
            Capability::CannotEnhance => {
                run.record_capability(&id, Capability::CannotEnhance);
                run.skip(&id, format!("engine '{}' cannot enhance this item", node.engine));
            }
            Capability::Synchronous => {
                run.start(&id, Some(Capability::Synchronous));
                let result = invoke(engine.as_ref(), run.item).await;
                run.finish(&id, result);
            }
            Capability::Asynchronous => {
                run.start(&id, Some(Capability::Asynchronous));
                let pool = self.workers.clone();
                let item = run.item.clone();
                let cancel = cancel.clone();
                workers.spawn(async move {
                    let work = async {
                        let _permit = pool
                            .acquire_owned()
                            .await
                            .map_err(|e| EngineError::internal(format!("worker pool closed: {e}")))?;
                        invoke(engine.as_ref(), &item).await
                    };
                    let result = tokio::select! {
                        result = work => result,
                        _ = cancel.cancelled() => Err(EngineError::Interrupted),
                    };
                    (id, result)
                });
            }
        }
    }
}

/// Call `apply`, turning a panic into an engine failure.
async fn invoke(engine: &dyn Engine, item: &ContentItem) -> Result<(), EngineError> {
    match AssertUnwindSafe(engine.apply(item)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(EngineError::Panicked(msg))
        }
    }
}

/// Mutable state of one run. Owned by the coordinating task only.
struct Execution<'a> {
    plan: &'a ExecutionPlanGraph,
    item: &'a ContentItem,
    outcomes: BTreeMap<NodeId, NodeOutcome>,
    /// Dependencies not yet satisfied, per node
    waiting_on: BTreeMap<NodeId, usize>,
    ready: BTreeSet<NodeId>,
    dispatch_order: Vec<NodeId>,
    /// Required nodes that failed, in failure order
    required_failures: Vec<NodeId>,
    cancelled: bool,
    started_at: chrono::DateTime<Utc>,
}

impl<'a> Execution<'a> {
    fn new(plan: &'a ExecutionPlanGraph, item: &'a ContentItem) -> Self {
        let mut run = Self {
            plan,
            item,
            outcomes: BTreeMap::new(),
            waiting_on: BTreeMap::new(),
            ready: BTreeSet::new(),
            dispatch_order: Vec::with_capacity(plan.len()),
            required_failures: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
        };
        for node in plan.nodes() {
            run.outcomes.insert(
                node.id.clone(),
                NodeOutcome::pending(node.id.clone(), node.engine.clone(), node.optional),
            );
            run.waiting_on.insert(node.id.clone(), node.depends_on.len());
        }
        let roots: Vec<NodeId> = run
            .waiting_on
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| id.clone())
            .collect();
        for id in roots {
            run.make_ready(&id);
        }
        run
    }

    fn state(&self, id: &NodeId) -> NodeRunState {
        self.outcomes
            .get(id)
            .map(|o| o.state)
            .unwrap_or(NodeRunState::Skipped)
    }

    fn set_state(&mut self, id: &NodeId, next: NodeRunState) -> bool {
        let Some(outcome) = self.outcomes.get_mut(id) else {
            return false;
        };
        if !outcome.state.can_transition_to(next) {
            tracing::error!(
                chain = self.plan.name(),
                node = %id,
                from = %outcome.state,
                to = %next,
                "illegal node state transition ignored"
            );
            return false;
        }
        tracing::debug!(chain = self.plan.name(), node = %id, from = %outcome.state, to = %next, "node transition");
        outcome.state = next;
        true
    }

    /// Lowest ready id, unless the run has been cancelled.
    fn next_ready(&mut self) -> Option<NodeId> {
        if self.cancelled {
            return None;
        }
        self.ready.pop_first()
    }

    fn make_ready(&mut self, id: &NodeId) {
        if self.state(id) == NodeRunState::Pending && self.set_state(id, NodeRunState::Ready) {
            self.ready.insert(id.clone());
        }
    }

    fn record_capability(&mut self, id: &NodeId, capability: Capability) {
        if let Some(outcome) = self.outcomes.get_mut(id) {
            outcome.capability = Some(capability);
        }
    }

    fn start(&mut self, id: &NodeId, capability: Option<Capability>) {
        if self.set_state(id, NodeRunState::Running) {
            if let Some(outcome) = self.outcomes.get_mut(id) {
                outcome.capability = capability;
                outcome.started_at = Some(Utc::now());
            }
        }
    }

    /// Skip a node that did not fail. Its dependents treat it as satisfied.
    fn skip(&mut self, id: &NodeId, reason: String) {
        tracing::debug!(chain = self.plan.name(), node = %id, reason = %reason, "node skipped");
        self.mark_skipped(id, reason);
        self.release_dependents(id);
    }

    fn mark_skipped(&mut self, id: &NodeId, reason: String) {
        self.ready.remove(id);
        if self.set_state(id, NodeRunState::Skipped) {
            if let Some(outcome) = self.outcomes.get_mut(id) {
                outcome.skip_reason = Some(reason);
                outcome.completed_at = Some(Utc::now());
            }
        }
    }

    fn release_dependents(&mut self, id: &NodeId) {
        let dependents: Vec<NodeId> = self.plan.dependents_of(id).cloned().collect();
        for dependent in dependents {
            if let Some(waiting) = self.waiting_on.get_mut(&dependent) {
                *waiting = waiting.saturating_sub(1);
                if *waiting == 0 {
                    self.make_ready(&dependent);
                }
            }
        }
    }

    /// Record the end of an engine invocation and propagate per node policy.
    fn finish(&mut self, id: &NodeId, result: Result<(), EngineError>) {
        let optional = self.outcomes.get(id).map(|o| o.optional).unwrap_or(false);
        match result {
            Ok(()) => {
                if self.set_state(id, NodeRunState::Completed) {
                    self.stamp_completed(id);
                    self.release_dependents(id);
                }
            }
            Err(error) => {
                if !self.set_state(id, NodeRunState::Failed) {
                    return;
                }
                tracing::warn!(
                    chain = self.plan.name(),
                    node = %id,
                    optional,
                    error = %error,
                    "engine failed"
                );
                self.stamp_completed(id);
                if let Some(outcome) = self.outcomes.get_mut(id) {
                    outcome.error = Some(error);
                }
                if optional {
                    self.release_dependents(id);
                } else {
                    self.required_failures.push(id.clone());
                    for dependent in self.plan.transitive_dependents(id) {
                        if !self.state(&dependent).is_terminal() {
                            self.mark_skipped(&dependent, format!("required dependency '{id}' failed"));
                        }
                    }
                }
            }
        }
    }

    fn stamp_completed(&mut self, id: &NodeId) {
        if let Some(outcome) = self.outcomes.get_mut(id) {
            outcome.completed_at = Some(Utc::now());
        }
    }

    /// On cancellation, every node that has not started is skipped.
    ///
    /// A cancel that arrives once every node is terminal leaves the run
    /// as it finished.
    fn cancel_unstarted(&mut self) {
        if self.cancelled {
            return;
        }
        if self.outcomes.values().all(|o| o.state.is_terminal()) {
            return;
        }
        self.cancelled = true;
        tracing::info!(chain = self.plan.name(), "chain run cancelled");
        let unstarted: Vec<NodeId> = self
            .outcomes
            .values()
            .filter(|o| matches!(o.state, NodeRunState::Pending | NodeRunState::Ready))
            .map(|o| o.node.clone())
            .collect();
        for id in unstarted {
            self.mark_skipped(&id, "chain run cancelled".to_string());
        }
    }

    fn into_result(mut self) -> Result<RunResult, SchedulerError> {
        // Only reachable if a worker task was lost.
        let stranded: Vec<NodeId> = self
            .outcomes
            .values()
            .filter(|o| o.state == NodeRunState::Running)
            .map(|o| o.node.clone())
            .collect();
        for id in stranded {
            self.finish(&id, Err(EngineError::internal("worker task lost")));
        }
        let leftover: Vec<NodeId> = self
            .outcomes
            .values()
            .filter(|o| !o.state.is_terminal())
            .map(|o| o.node.clone())
            .collect();
        for id in leftover {
            self.mark_skipped(&id, "dependencies never resolved".to_string());
        }

        let outcome = if self.cancelled || !self.required_failures.is_empty() {
            RunOutcome::Failure
        } else if self.outcomes.values().any(|o| o.state == NodeRunState::Failed) {
            RunOutcome::PartialFailure
        } else {
            RunOutcome::Success
        };

        let result = RunResult {
            chain: self.plan.name().to_string(),
            item_uri: self.item.uri().to_string(),
            outcome,
            cancelled: self.cancelled,
            nodes: self.outcomes,
            dispatch_order: self.dispatch_order,
            started_at: self.started_at,
            completed_at: Utc::now(),
        };
        tracing::info!(
            chain = %result.chain,
            item = %result.item_uri,
            outcome = ?result.outcome,
            completed = result.completed_nodes().len(),
            failed = result.failed_nodes().len(),
            skipped = result.skipped_nodes().len(),
            "chain run finished"
        );

        if result.cancelled {
            return Err(SchedulerError::Cancelled {
                result: Box::new(result),
            });
        }

        let Some(failed) = self.required_failures.first() else {
            return Ok(result);
        };
        let Some(outcome) = result.nodes.get(failed) else {
            return Ok(result);
        };
        let unmet_dependencies = self
            .plan
            .node(failed)
            .map(|node| {
                node.depends_on
                    .iter()
                    .filter(|dep| result.state_of(dep) != Some(NodeRunState::Completed))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let failure = ChainFailure {
            node: failed.clone(),
            engine: outcome.engine.clone(),
            optional: outcome.optional,
            unmet_dependencies,
            cause: outcome
                .error
                .clone()
                .unwrap_or_else(|| EngineError::internal("unknown failure")),
            result: result.clone(),
        };
        Err(SchedulerError::ChainFailure(Box::new(failure)))
    }
}
