
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use oracle_core::adapter::{Adapter, AdapterRegistry};
use oracle_core::engine::{ExecutionEngine, RunQueue, WorkerPool};
use oracle_core::errors::{AdapterError, EngineError};
use oracle_core::model::{JobRun, JobSpec, JobSpecRequest, Lease, RunStatus, TaskSpec};
use oracle_core::store::{InMemoryStore, Store};
use serde_json::{json, Map, Value};
use test_support::FlakyStore;
use tokio::sync::{watch, Notify};

/// Añade `suffix` al string de entrada.
struct Append;

#[async_trait]
impl Adapter for Append {
    async fn perform(&self, input: &Value, params: &Map<String, Value>) -> Result<Value, AdapterError> {
        let base = input.as_str().unwrap_or_default();
        let suffix = params.get("suffix").and_then(Value::as_str).unwrap_or("+");
        Ok(Value::String(format!("{base}{suffix}")))
    }
}

struct Fail;

#[async_trait]
impl Adapter for Fail {
    async fn perform(&self, _input: &Value, _params: &Map<String, Value>) -> Result<Value, AdapterError> {
        Err(AdapterError::Execution("upstream returned 503".into()))
    }
}

#[derive(Clone, Default)]
struct Counter(Arc<AtomicUsize>);

#[async_trait]
impl Adapter for Counter {
    async fn perform(&self, input: &Value, _params: &Map<String, Value>) -> Result<Value, AdapterError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(input.clone())
    }
}

/// Bloquea hasta que el test libere el `Notify`.
struct Gate(Arc<Notify>);

#[async_trait]
impl Adapter for Gate {
    async fn perform(&self, input: &Value, _params: &Map<String, Value>) -> Result<Value, AdapterError> {
        self.0.notified().await;
        Ok(input.clone())
    }
}

fn spec_with(tasks: Vec<TaskSpec>) -> JobSpec {
    JobSpec::new(JobSpecRequest { tasks, ..Default::default() })
}

fn engine(registry: AdapterRegistry) -> (Arc<InMemoryStore>, ExecutionEngine<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (store.clone(), ExecutionEngine::new(store, Arc::new(registry)))
}

fn pending_run(store: &InMemoryStore, spec: &JobSpec, input: Value) -> JobRun {
    store.save_job_spec(spec).unwrap();
    let run = JobRun::new(spec, input);
    store.save_job_run(&run).unwrap();
    run
}

#[tokio::test]
async fn pipeline_chains_results_and_completes() {
    let (store, engine) = engine(AdapterRegistry::new().register("append", Append));
    let spec = spec_with(vec![TaskSpec::new("append").with_param("suffix", json!("a")),
                              TaskSpec::new("Append").with_param("suffix", json!("b")),
                              TaskSpec::new("APPEND").with_param("suffix", json!("c"))]);
    let run = pending_run(&store, &spec, json!(">"));

    let done = engine.execute(&run.id).await.unwrap();
    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.result, Some(json!(">abc")));
    assert!(done.finished_at.is_some());
    assert_eq!(done.task_runs[1].input, Some(json!(">a")));
    assert_eq!(store.job_run(&run.id).unwrap(), done);
}

#[tokio::test]
async fn failing_task_aborts_the_pipeline() {
    let (store, engine) = engine(AdapterRegistry::new().register("append", Append).register("fail", Fail));
    let spec = spec_with(vec![TaskSpec::new("append"), TaskSpec::new("fail"), TaskSpec::new("append")]);
    let run = pending_run(&store, &spec, json!(""));

    let done = engine.execute(&run.id).await.unwrap();
    let statuses: Vec<RunStatus> = done.task_runs.iter().map(|t| t.status).collect();
    assert_eq!(statuses, vec![RunStatus::Completed, RunStatus::Errored, RunStatus::Pending]);
    assert_eq!(done.status, RunStatus::Errored);
    assert_eq!(done.task_runs[1].error.as_deref(), Some("upstream returned 503"));
    assert_eq!(done.result, None);

    let stored = store.job_run(&run.id).unwrap();
    assert_eq!(stored.status, RunStatus::Errored);
    assert_eq!(stored.task_runs[2].status, RunStatus::Pending);
}

#[tokio::test]
async fn unknown_adapter_at_run_time_errors_the_task() {
    let (store, engine) = engine(AdapterRegistry::new());
    let spec = spec_with(vec![TaskSpec::new("IdoNotExist")]);
    let run = pending_run(&store, &spec, Value::Null);

    let done = engine.execute(&run.id).await.unwrap();
    assert_eq!(done.status, RunStatus::Errored);
    assert_eq!(done.task_runs[0].error.as_deref(), Some("IdoNotExist is not a supported adapter type"));
}

#[tokio::test]
async fn a_run_is_claimed_only_once() {
    let (store, engine) = engine(AdapterRegistry::new().register("append", Append));
    let spec = spec_with(vec![TaskSpec::new("append")]);
    let run = pending_run(&store, &spec, json!(""));

    engine.execute(&run.id).await.unwrap();
    let err = engine.execute(&run.id).await.unwrap_err();
    assert_eq!(err, EngineError::NotClaimable { id: run.id.clone(),
                                                status: "completed".into() });
}

#[tokio::test]
async fn resume_continues_from_first_unfinished_task() {
    let counter = Counter::default();
    let (store, engine) = engine(AdapterRegistry::new().register("count", counter.clone()));
    let spec = spec_with(vec![TaskSpec::new("count"), TaskSpec::new("count"), TaskSpec::new("count")]);
    store.save_job_spec(&spec).unwrap();

    // estado que deja un crash después del primer task
    let mut run = JobRun::new(&spec, json!("seed"));
    run.status = RunStatus::InProgress;
    run.task_runs[0].start(json!("seed"));
    run.task_runs[0].complete(json!("seed"));
    store.save_job_run(&run).unwrap();

    let recovered = engine.recover().await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].status, RunStatus::Completed);
    assert_eq!(recovered[0].result, Some(json!("seed")));
    assert_eq!(counter.0.load(Ordering::SeqCst), 2, "completed task must not run again");
}

/// Run `InProgress` con el primer task hecho, como lo deja un engine caído.
fn interrupted_run(store: &dyn Store, spec: &JobSpec, lease: Option<Lease>) -> JobRun {
    store.save_job_spec(spec).unwrap();
    let mut run = JobRun::new(spec, json!("seed"));
    run.status = RunStatus::InProgress;
    run.lease = lease;
    run.task_runs[0].start(json!("seed"));
    run.task_runs[0].complete(json!("seed"));
    store.save_job_run(&run).unwrap();
    run
}

async fn wait_for_task_in_flight(store: &InMemoryStore, run_id: &str) {
    for _ in 0..200 {
        if store.job_run(run_id).unwrap().task_runs[0].status == RunStatus::InProgress {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task of run {run_id} never started");
}

#[tokio::test]
async fn concurrent_resumes_drive_a_run_once() {
    let counter = Counter::default();
    let registry = Arc::new(AdapterRegistry::new().register("count", counter.clone()));
    let store = Arc::new(InMemoryStore::new());
    let first = ExecutionEngine::new(store.clone(), registry.clone());
    let second = ExecutionEngine::new(store.clone(), registry);
    assert_ne!(first.owner(), second.owner());
    let run = interrupted_run(store.as_ref(), &spec_with(vec![TaskSpec::new("count"), TaskSpec::new("count")]), None);

    let (a, b) = tokio::join!(first.resume(&run.id), second.resume(&run.id));
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(r, Err(EngineError::NotClaimable { .. }))));
    assert_eq!(counter.0.load(Ordering::SeqCst), 1, "remaining task runs exactly once");
    assert_eq!(store.job_run(&run.id).unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn live_lease_is_not_taken_over() {
    let gate = Arc::new(Notify::new());
    let registry = Arc::new(AdapterRegistry::new().register("gate", Gate(gate.clone())));
    let store = Arc::new(InMemoryStore::new());
    let owner = ExecutionEngine::new(store.clone(), registry.clone());
    let other = ExecutionEngine::new(store.clone(), registry);
    let run = pending_run(&store, &spec_with(vec![TaskSpec::new("gate")]), Value::Null);

    let handle = {
        let owner = owner.clone();
        let id = run.id.clone();
        tokio::spawn(async move { owner.execute(&id).await })
    };
    wait_for_task_in_flight(&store, &run.id).await;

    assert!(matches!(other.resume(&run.id).await, Err(EngineError::NotClaimable { .. })));
    assert!(other.recover().await.unwrap().is_empty());
    assert!(store.job_run(&run.id).unwrap().is_owned_by(owner.owner()));

    gate.notify_one();
    let done = handle.await.unwrap().unwrap();
    assert_eq!(done.status, RunStatus::Completed);
}

#[tokio::test]
async fn heartbeat_keeps_the_lease_alive_during_slow_tasks() {
    let gate = Arc::new(Notify::new());
    let registry = Arc::new(AdapterRegistry::new().register("gate", Gate(gate.clone())));
    let store = Arc::new(InMemoryStore::new());
    let engine = ExecutionEngine::new(store.clone(), registry).with_lease(chrono::Duration::milliseconds(300));
    let run = pending_run(&store, &spec_with(vec![TaskSpec::new("gate")]), Value::Null);

    let handle = {
        let engine = engine.clone();
        let id = run.id.clone();
        tokio::spawn(async move { engine.execute(&id).await })
    };
    wait_for_task_in_flight(&store, &run.id).await;
    // más del doble del lease sin que el task termine
    tokio::time::sleep(Duration::from_millis(700)).await;

    let stored = store.job_run(&run.id).unwrap();
    let lease = stored.lease.expect("in-flight run carries a lease");
    assert_eq!(lease.owner, engine.owner());
    assert!(!lease.is_expired(Utc::now()), "lease must be renewed while the adapter runs");

    gate.notify_one();
    assert_eq!(handle.await.unwrap().unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn expired_lease_is_recovered_by_another_engine() {
    let counter = Counter::default();
    let (store, engine) = engine(AdapterRegistry::new().register("count", counter.clone()));
    let spec = spec_with(vec![TaskSpec::new("count"), TaskSpec::new("count"), TaskSpec::new("count")]);
    let crashed = Lease::new("crashed-engine", Utc::now() - chrono::Duration::seconds(1));
    let run = interrupted_run(store.as_ref(), &spec, Some(crashed));

    let recovered = engine.recover().await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].status, RunStatus::Completed);
    assert!(recovered[0].is_owned_by(engine.owner()));
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    assert_eq!(store.job_run(&run.id).unwrap(), recovered[0]);
}

#[tokio::test]
async fn engine_stops_driving_a_run_taken_by_another_owner() {
    let gate = Arc::new(Notify::new());
    let (store, engine) = engine(AdapterRegistry::new().register("gate", Gate(gate.clone()))
                                                      .register("append", Append));
    let run = pending_run(&store, &spec_with(vec![TaskSpec::new("gate"), TaskSpec::new("append")]), json!("x"));

    let handle = {
        let engine = engine.clone();
        let id = run.id.clone();
        tokio::spawn(async move { engine.execute(&id).await })
    };
    wait_for_task_in_flight(&store, &run.id).await;

    // otro nodo considera vencido el lease y se queda con el run
    let intruder = Lease::new("intruder", Utc::now() + chrono::Duration::hours(1));
    let later = Utc::now() + chrono::Duration::minutes(10);
    assert!(store.reclaim_job_run(&run.id, &intruder, later).unwrap().is_some());
    gate.notify_one();

    assert_eq!(handle.await.unwrap(), Err(EngineError::LeaseLost(run.id.clone())));
    let stored = store.job_run(&run.id).unwrap();
    assert!(stored.is_owned_by("intruder"));
    assert_eq!(stored.task_runs[0].status, RunStatus::InProgress);
    assert_eq!(stored.task_runs[1].status, RunStatus::Pending);
}

#[tokio::test]
async fn recover_continues_past_a_failing_run() {
    let counter = Counter::default();
    let store = Arc::new(FlakyStore::new());
    let engine = ExecutionEngine::new(store.clone(), Arc::new(AdapterRegistry::new().register("count", counter.clone())));
    let spec = spec_with(vec![TaskSpec::new("count"), TaskSpec::new("count")]);
    let broken = interrupted_run(store.as_ref(), &spec, None);
    let healthy = interrupted_run(store.as_ref(), &spec, None);
    store.fail_next_reclaim_of(&broken.id);

    let recovered = engine.recover().await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].id, healthy.id);
    assert_eq!(recovered[0].status, RunStatus::Completed);
    assert_eq!(store.job_run(&broken.id).unwrap().status, RunStatus::InProgress);

    // el siguiente ciclo de recuperación se encarga del que falló
    let retried = engine.recover().await.unwrap();
    assert_eq!(retried.len(), 1);
    assert_eq!(retried[0].id, broken.id);
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
}

#[test]
fn resume_rejects_runs_that_are_not_in_progress() {
    let (store, engine) = engine(AdapterRegistry::new().register("append", Append));
    let run = pending_run(&store, &spec_with(vec![TaskSpec::new("append")]), Value::Null);
    let err = tokio_test::assert_err!(tokio_test::block_on(engine.resume(&run.id)));
    assert!(matches!(err, EngineError::NotClaimable { .. }));
}

#[tokio::test]
async fn cancelled_pending_run_is_never_executed() {
    let (store, engine) = engine(AdapterRegistry::new().register("append", Append));
    let run = pending_run(&store, &spec_with(vec![TaskSpec::new("append")]), Value::Null);

    assert!(engine.cancel(&run.id).unwrap());
    assert!(matches!(engine.execute(&run.id).await, Err(EngineError::NotClaimable { .. })));
    assert_eq!(store.job_run(&run.id).unwrap().task_runs[0].status, RunStatus::Pending);
}

#[tokio::test]
async fn cancellation_takes_effect_at_the_next_task_boundary() {
    let gate = Arc::new(Notify::new());
    let (store, engine) = engine(AdapterRegistry::new().register("gate", Gate(gate.clone()))
                                                      .register("append", Append));
    let spec = spec_with(vec![TaskSpec::new("gate"), TaskSpec::new("append")]);
    let run = pending_run(&store, &spec, json!("x"));

    let handle = {
        let engine = engine.clone();
        let id = run.id.clone();
        tokio::spawn(async move { engine.execute(&id).await })
    };

    // esperar a que el primer task esté en vuelo
    for _ in 0..200 {
        if store.job_run(&run.id).unwrap().task_runs[0].status == RunStatus::InProgress {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(engine.cancel(&run.id).unwrap());
    gate.notify_one();

    let done = handle.await.unwrap().unwrap();
    assert_eq!(done.status, RunStatus::Cancelled);
    assert_eq!(done.task_runs[0].status, RunStatus::Completed);
    assert_eq!(done.task_runs[1].status, RunStatus::Pending);
    assert_eq!(store.job_run(&run.id).unwrap().status, RunStatus::Cancelled);
}

#[tokio::test]
async fn worker_pool_executes_queued_runs() {
    let (store, engine) = engine(AdapterRegistry::new().register("append", Append));
    let spec = spec_with(vec![TaskSpec::new("append")]);
    let runs: Vec<JobRun> = (0..5).map(|i| pending_run(&store, &spec, json!(i.to_string()))).collect();

    let (queue, rx) = RunQueue::channel();
    let (stop_tx, stop_rx) = watch::channel(false);
    let pool = tokio::spawn(WorkerPool::new(engine, 2).run(rx, stop_rx));
    for run in &runs {
        queue.enqueue(&run.id).unwrap();
    }
    // encolar dos veces el mismo run no lo ejecuta dos veces
    queue.enqueue(&runs[0].id).unwrap();

    for _ in 0..200 {
        if runs.iter().all(|r| store.job_run(&r.id).unwrap().is_terminal()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), pool).await.unwrap().unwrap();

    for (i, run) in runs.iter().enumerate() {
        let stored = store.job_run(&run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.result, Some(json!(format!("{i}+"))));
    }
}

#[tokio::test]
async fn closed_queue_rejects_new_runs() {
    let (queue, rx) = RunQueue::channel();
    drop(rx);
    assert_eq!(queue.enqueue("anything"), Err(EngineError::QueueClosed));
}
