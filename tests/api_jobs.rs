//! Facade scenarios: chain jobs, reports, deadlines and configuration

mod common;

use common::{registry_of, EventLog, MockEngine};
use enhancer::{
    Capability, ContentItem, EnhancerApi, EnhancerConfig, ExecutionNode, ExecutionPlanGraph, JobError, JobId,
    JobStatus, NodeId, NodeRunState, RunOutcome, SchedulerError,
};
use std::sync::Arc;
use std::time::Duration;

fn item(uri: &str) -> ContentItem {
    ContentItem::new(uri, "text/plain", b"Rome is in Italy".to_vec())
}

fn api_with(engines: Vec<MockEngine>) -> EnhancerApi {
    EnhancerApi::new(Arc::new(registry_of(engines)))
}

async fn wait_until_done(api: &EnhancerApi, id: &JobId) {
    for _ in 0..200 {
        if api.job_status(id) == JobStatus::Done {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} did not finish");
}

fn two_step_plan() -> ExecutionPlanGraph {
    ExecutionPlanGraph::new(
        "two-step",
        vec![
            ExecutionNode::for_engine("langdetect"),
            ExecutionNode::for_engine("ner").depends_on("langdetect"),
        ],
    )
    .unwrap()
}

// === Scenario: a submitted chain job publishes its report ===
#[tokio::test]
async fn submitted_job_reports_at_its_result_location() {
    let log = EventLog::new();
    let api = api_with(vec![
        MockEngine::new("langdetect", Capability::Synchronous, &log),
        MockEngine::new("ner", Capability::Asynchronous, &log).with_delay(Duration::from_millis(10)),
    ]);

    let id = api.submit_chain_as_job(item("urn:doc:1"), Some(&two_step_plan())).unwrap();
    let location = api.job_result_location(&id).unwrap();
    assert_eq!(location, format!("/jobs/{id}"));

    wait_until_done(&api, &id).await;
    let report = api.job_report(&location).expect("report stored");
    assert!(report.is_success());
    assert_eq!(report.job_id, id);
    assert_eq!(report.item_uri, "urn:doc:1");
    assert_eq!(report.outcome, Some(RunOutcome::Success));
    let result = report.result.unwrap();
    assert_eq!(result.state_of(&NodeId::from("ner")), Some(NodeRunState::Completed));

    assert_eq!(api.list_jobs(), vec![(id, JobStatus::Done, location)]);
}

// === Scenario: failed chain jobs keep the failure in their report ===
#[tokio::test]
async fn failed_job_report_carries_error_and_partial_result() {
    let log = EventLog::new();
    let api = api_with(vec![
        MockEngine::new("langdetect", Capability::Synchronous, &log).failing(),
        MockEngine::new("ner", Capability::Synchronous, &log),
    ]);

    let id = api.submit_chain_as_job(item("urn:doc:2"), Some(&two_step_plan())).unwrap();
    wait_until_done(&api, &id).await;

    let report = api.job_report(&api.job_result_location(&id).unwrap()).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.outcome, Some(RunOutcome::Failure));
    assert!(report.error.unwrap().contains("langdetect"));
    let result = report.result.unwrap();
    assert_eq!(result.state_of(&NodeId::from("ner")), Some(NodeRunState::Skipped));
}

// === Scenario: identical submissions share an id ===
#[tokio::test]
async fn same_submission_yields_same_job_id() {
    let log = EventLog::new();
    let api = api_with(vec![
        MockEngine::new("langdetect", Capability::Synchronous, &log),
        MockEngine::new("ner", Capability::Synchronous, &log),
    ]);

    let first = api.submit_chain_as_job(item("urn:doc:3"), Some(&two_step_plan())).unwrap();
    let second = api.submit_chain_as_job(item("urn:doc:3"), Some(&two_step_plan())).unwrap();
    let other = api.submit_chain_as_job(item("urn:doc:4"), Some(&two_step_plan())).unwrap();

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(api.list_jobs().len(), 2);
}

// === Scenario: cancelling and evicting jobs ===
#[tokio::test]
async fn cancel_and_evict_forget_jobs() {
    let log = EventLog::new();
    let api = api_with(vec![
        MockEngine::new("langdetect", Capability::Asynchronous, &log).with_delay(Duration::from_secs(5)),
        MockEngine::new("ner", Capability::Synchronous, &log),
    ]);

    let unknown = JobId::for_description("never submitted");
    assert_eq!(api.cancel_job(&unknown), Err(JobError::NotFound(unknown)));

    let a = api.submit_chain_as_job(item("urn:doc:a"), Some(&two_step_plan())).unwrap();
    let b = api.submit_chain_as_job(item("urn:doc:b"), Some(&two_step_plan())).unwrap();
    let c = api.submit_chain_as_job(item("urn:doc:c"), Some(&two_step_plan())).unwrap();
    assert_eq!(api.job_status(&a), JobStatus::Running);

    let location = api.job_result_location(&a).unwrap();
    api.cancel_job(&a).unwrap();
    assert_eq!(api.job_status(&a), JobStatus::Unknown);
    assert_eq!(api.job_result_location(&a), Err(JobError::NotFound(a)));
    assert!(api.job_report(&location).is_none());

    assert_eq!(api.evict_all_jobs(), 2);
    assert!(api.list_jobs().is_empty());
    for id in [a, b, c] {
        assert_eq!(api.job_status(&id), JobStatus::Unknown);
    }
}

// === Scenario: default chain when no plan is given ===
#[tokio::test]
async fn job_without_plan_uses_default_chain() {
    let log = EventLog::new();
    let api = api_with(vec![MockEngine::new("langdetect", Capability::Synchronous, &log)]);

    let id = api.submit_chain_as_job(item("urn:doc:5"), None).unwrap();
    wait_until_done(&api, &id).await;
    let report = api.job_report(&api.job_result_location(&id).unwrap()).unwrap();
    assert_eq!(report.chain, "default");

    let empty = api_with(Vec::new());
    assert!(matches!(
        empty.submit_chain_as_job(item("urn:doc:6"), None),
        Err(SchedulerError::NoEngines)
    ));
}

// === Scenario: facade deadline ===
#[tokio::test]
async fn run_past_deadline_returns_partial_result() {
    let log = EventLog::new();
    let api = api_with(vec![
        MockEngine::new("langdetect", Capability::Synchronous, &log),
        MockEngine::new("ner", Capability::Asynchronous, &log).with_delay(Duration::from_secs(5)),
    ])
    .with_max_wait(Some(Duration::from_millis(50)));

    let err = api.run_chain(&item("urn:doc:7"), Some(&two_step_plan())).await.unwrap_err();
    let SchedulerError::DeadlineExceeded { limit, result } = err else {
        panic!("expected deadline");
    };
    assert_eq!(limit, Duration::from_millis(50));
    assert_eq!(result.state_of(&NodeId::from("langdetect")), Some(NodeRunState::Completed));
    assert_eq!(result.state_of(&NodeId::from("ner")), Some(NodeRunState::Failed));
}

#[tokio::test]
async fn run_within_deadline_succeeds() {
    let log = EventLog::new();
    let api = api_with(vec![
        MockEngine::new("langdetect", Capability::Synchronous, &log),
        MockEngine::new("ner", Capability::Asynchronous, &log),
    ])
    .with_max_wait(Some(Duration::from_secs(5)));

    let result = api.run_chain(&item("urn:doc:8"), Some(&two_step_plan())).await.unwrap();
    assert!(result.is_success());
}

// === Scenario: wiring from configuration ===
#[tokio::test]
async fn api_from_config_runs_configured_chains() {
    let config = EnhancerConfig::from_yaml(
        r#"
workers: 1
result_location_prefix: /results/
default_chain: nlp
chains:
  - name: nlp
    nodes:
      - "langdetect"
      - "ner;dependsOn=langdetect"
      - "geo;dependsOn=ner;optional"
"#,
    )
    .unwrap();
    let log = EventLog::new();
    let engines = registry_of(vec![
        MockEngine::new("langdetect", Capability::Synchronous, &log),
        MockEngine::new("ner", Capability::Asynchronous, &log),
        MockEngine::new("geo", Capability::Asynchronous, &log).failing(),
    ]);
    let api = EnhancerApi::from_config(Arc::new(engines), &config).unwrap();
    assert_eq!(api.scheduler().worker_limit(), 1);

    let result = api.run_named_chain(&item("urn:doc:9"), "nlp").await.unwrap();
    assert_eq!(result.outcome, RunOutcome::PartialFailure);

    // No plan: the configured default chain wins over the engine list
    let result = api.run_chain(&item("urn:doc:10"), None).await.unwrap();
    assert_eq!(result.chain, "nlp");

    let id = api.submit_chain_as_job(item("urn:doc:11"), None).unwrap();
    assert!(api.job_result_location(&id).unwrap().starts_with("/results/"));
}
