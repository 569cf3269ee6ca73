//! `OracleNode`: contexto de larga vida que reúne store, registro de
//! adapters, parser cron, engine y scheduler.
//!
//! Las operaciones de creación validan todo antes de escribir: un request
//! rechazado no deja nada persistido. Los errores en tiempo de ejecución
//! quedan registrados en el `JobRun`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use tokio::sync::watch;

use oracle_core::model::{JobRun, JobSpec, RunStatus};
use oracle_core::{AdapterRegistry, CronParser, ExecutionEngine, RunFilter, RunQueue, Scheduler, ServiceAgreement,
                  Signer, Store, TriggerSource, WorkerPool};

use crate::errors::NodeError;

pub struct OracleNode<S: Store + 'static> {
    store: Arc<S>,
    registry: Arc<AdapterRegistry>,
    cron: Arc<dyn CronParser>,
    engine: ExecutionEngine<S>,
    scheduler: Scheduler<S>,
}

impl<S: Store + 'static> OracleNode<S> {
    pub fn new(store: Arc<S>, registry: AdapterRegistry, cron: Arc<dyn CronParser>) -> Self {
        let registry = Arc::new(registry);
        let engine = ExecutionEngine::new(Arc::clone(&store), Arc::clone(&registry));
        let scheduler = Scheduler::new(Arc::clone(&store), Arc::clone(&cron));
        Self { store,
               registry,
               cron,
               engine,
               scheduler }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn engine(&self) -> &ExecutionEngine<S> {
        &self.engine
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    /// Parsea, valida y persiste un JobSpec.
    pub fn create_job(&self, raw: &[u8]) -> Result<JobSpec, NodeError> {
        let spec = JobSpec::from_json(raw)?;
        spec.validate(&self.registry, self.cron.as_ref())?;
        self.store.save_job_spec(&spec)?;
        info!("job {} creado ({} tasks)", spec.id, spec.tasks.len());
        Ok(spec)
    }

    /// Construye, valida y persiste un agreement junto con su JobSpec.
    pub fn create_service_agreement(&self, raw: &[u8], signer: &dyn Signer) -> Result<ServiceAgreement, NodeError> {
        let (agreement, spec) = ServiceAgreement::build(raw, signer)?;
        spec.validate(&self.registry, self.cron.as_ref())?;
        agreement.verify_id()?;
        self.store.create_service_agreement(&agreement, &spec)?;
        info!("service agreement {} creado (job {})", agreement.id, spec.id);
        Ok(agreement)
    }

    pub fn job_spec(&self, id: &str) -> Result<JobSpec, NodeError> {
        Ok(self.store.job_spec(id)?)
    }

    pub fn job_run(&self, id: &str) -> Result<JobRun, NodeError> {
        Ok(self.store.job_run(id)?)
    }

    pub fn service_agreement(&self, id: &str) -> Result<ServiceAgreement, NodeError> {
        Ok(self.store.service_agreement(id)?)
    }

    /// Runs de un JobSpec existente, ordenados por creación.
    pub fn job_runs_for(&self, job_spec_id: &str) -> Result<Vec<JobRun>, NodeError> {
        self.store.job_spec(job_spec_id)?;
        Ok(self.store.job_runs(&RunFilter::JobSpecId(job_spec_id.to_string()))?)
    }

    /// Run manual. `Ok(None)` fuera de la ventana de validez.
    pub fn trigger_web(&self, job_spec_id: &str, input: Value) -> Result<Option<JobRun>, NodeError> {
        Ok(self.scheduler.trigger(job_spec_id, TriggerSource::Web, input, Utc::now())?)
    }

    /// Run disparado por un evento externo ya decodificado.
    pub fn trigger_external(&self, job_spec_id: &str, payload: Value) -> Result<Option<JobRun>, NodeError> {
        Ok(self.scheduler.trigger(job_spec_id, TriggerSource::External, payload, Utc::now())?)
    }

    pub fn cancel_run(&self, run_id: &str) -> Result<bool, NodeError> {
        Ok(self.engine.cancel(run_id)?)
    }

    /// Ejecuta un run `Pending` en la tarea actual.
    pub async fn execute_run(&self, run_id: &str) -> Result<JobRun, NodeError> {
        Ok(self.engine.execute(run_id).await?)
    }

    /// Scheduler + pool de workers hasta que `shutdown` pase a `true`.
    ///
    /// Al arrancar encola los runs `Pending`. En paralelo, cada período de
    /// lease se recuperan los runs `InProgress` cuyo engine dejó de renovar.
    pub async fn serve(&self,
                       concurrency: usize,
                       interval: Duration,
                       shutdown: watch::Receiver<bool>)
                       -> Result<(), NodeError> {
        let (queue, rx) = RunQueue::channel();
        for run in self.store.job_runs(&RunFilter::Status(RunStatus::Pending))? {
            queue.enqueue(&run.id)?;
        }

        let recovery = tokio::spawn(Self::recover_loop(self.engine.clone(), shutdown.clone()));
        let pool = tokio::spawn(WorkerPool::new(self.engine.clone(), concurrency).run(rx, shutdown.clone()));
        self.scheduler.run(queue, interval, shutdown).await;
        if let Err(e) = pool.await {
            error!("worker pool terminó con error: {}", e);
        }
        if let Err(e) = recovery.await {
            error!("recuperación de runs terminó con error: {}", e);
        }
        Ok(())
    }

    async fn recover_loop(engine: ExecutionEngine<S>, mut shutdown: watch::Receiver<bool>) {
        let every = engine.lease().to_std().unwrap_or(Duration::from_secs(30));
        loop {
            match engine.recover().await {
                Ok(runs) if !runs.is_empty() => warn!("{} runs interrumpidos recuperados", runs.len()),
                Ok(_) => {}
                Err(e) => error!("recuperación de runs falló: {}", e),
            }
            tokio::select! {
                _ = tokio::time::sleep(every) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
