//! Motor de ejecución de `JobRun`s.
//!
//! Un run se reclama con CAS (`Pending -> InProgress`) tomando un lease a
//! nombre del engine, y sus `TaskRun`s se ejecutan en orden persistiendo cada
//! transición. Mientras un adapter está en vuelo el lease se renueva; si otro
//! engine se queda con el run, este deja de conducirlo (`LeaseLost`).
//!
//! El primer fallo marca el task y el run como `Errored`; los tasks
//! siguientes quedan `Pending`. La cancelación se observa en cada frontera
//! entre tasks.
//!
//! El `Store` es síncrono: cada llamada corre en `spawn_blocking` para no
//! bloquear el runtime.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use tokio::time::{interval_at, Instant};

use crate::adapter::AdapterRegistry;
use crate::constants::RUN_LEASE_SECS;
use crate::errors::{EngineError, StoreError};
use crate::model::{new_id, JobRun, Lease, RunStatus};
use crate::store::{RunFilter, Store};

pub struct ExecutionEngine<S: Store> {
    store: Arc<S>,
    registry: Arc<AdapterRegistry>,
    owner: String,
    lease: Duration,
}

impl<S: Store> Clone for ExecutionEngine<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store),
               registry: Arc::clone(&self.registry),
               owner: self.owner.clone(),
               lease: self.lease }
    }
}

impl<S: Store> ExecutionEngine<S> {
    /// Engine con identidad propia. Los clones comparten identidad.
    pub fn new(store: Arc<S>, registry: Arc<AdapterRegistry>) -> Self {
        Self { store,
               registry,
               owner: new_id(),
               lease: Duration::seconds(RUN_LEASE_SECS) }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Identidad con la que este engine toma leases.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Pide la cancelación. `Ok(false)` si el run ya era terminal.
    pub fn cancel(&self, run_id: &str) -> Result<bool, EngineError> {
        Ok(self.store.cancel_job_run(run_id)?)
    }

    fn next_lease(&self) -> Lease {
        Lease::new(self.owner.clone(), Utc::now() + self.lease)
    }
}

impl<S: Store + 'static> ExecutionEngine<S> {
    /// Reclama un run `Pending` y lo ejecuta hasta un estado terminal.
    pub async fn execute(&self, run_id: &str) -> Result<JobRun, EngineError> {
        let lease = self.next_lease();
        let id = run_id.to_string();
        let Some(run) = self.with_store(move |s| s.claim_job_run(&id, &lease)).await? else {
            return Err(self.not_claimable(run_id).await);
        };
        info!("run {} reclamado (job {})", run.id, run.job_spec_id);
        self.drive(run).await
    }

    /// Continúa un run `InProgress` desde su primer task no terminal. Sólo
    /// procede si el lease anterior venció; un run que otro engine conduce
    /// devuelve `NotClaimable`.
    pub async fn resume(&self, run_id: &str) -> Result<JobRun, EngineError> {
        let lease = self.next_lease();
        let id = run_id.to_string();
        let now = Utc::now();
        let Some(run) = self.with_store(move |s| s.reclaim_job_run(&id, &lease, now)).await? else {
            return Err(self.not_claimable(run_id).await);
        };
        info!("reanudando run {} desde task {:?}", run.id, run.next_task_index());
        self.drive(run).await
    }

    /// Reanuda los runs `InProgress` cuyo lease venció (p. ej. tras un crash
    /// del engine que los conducía). Un run que falla no detiene al resto.
    pub async fn recover(&self) -> Result<Vec<JobRun>, EngineError> {
        let stuck = self.with_store(|s| s.job_runs(&RunFilter::Status(RunStatus::InProgress)))
                        .await?;
        let mut recovered = Vec::with_capacity(stuck.len());
        for run in stuck {
            match self.resume(&run.id).await {
                Ok(done) => recovered.push(done),
                Err(EngineError::NotClaimable { id, status }) => {
                    debug!("run {} no recuperable ({}), ignorado", id, status)
                }
                Err(e) => warn!("run {}: recuperación fallida: {}", run.id, e),
            }
        }
        Ok(recovered)
    }

    async fn drive(&self, mut run: JobRun) -> Result<JobRun, EngineError> {
        while let Some(index) = run.next_task_index() {
            let id = run.id.clone();
            let stored = self.with_store(move |s| s.job_run(&id)).await?;
            if stored.is_terminal() {
                debug!("run {} terminado externamente ({})", run.id, stored.status);
                return Ok(stored);
            }

            // Un task InProgress (crash a mitad) se repite con el mismo input.
            let input = run.input_for(index);
            run.task_runs[index].start(input.clone());
            run = self.persist(run).await?;
            if run.is_terminal() {
                return Ok(run);
            }

            let task = run.task_runs[index].task.clone();
            let outcome = match self.registry.resolve(&task.task_type) {
                Ok(adapter) => self.perform_leased(&run.id, adapter.perform(&input, &task.params))
                                   .await?
                                   .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(value) => run.task_runs[index].complete(value),
                Err(message) => {
                    warn!("run {}: task {} ({}) falló: {}", run.id, index, task.task_type, message);
                    run.task_runs[index].fail(message);
                    run.mark_errored(Utc::now());
                    return self.persist(run).await;
                }
            }
            run = self.persist(run).await?;
            if run.is_terminal() {
                return Ok(run);
            }
        }

        run.mark_completed(Utc::now());
        info!("run {} completado", run.id);
        self.persist(run).await
    }

    /// Espera a `work` renovando el lease de `run_id` cada tercio de su
    /// duración.
    async fn perform_leased<F, T>(&self, run_id: &str, work: F) -> Result<T, EngineError>
        where F: Future<Output = T>
    {
        let period = (self.lease / 3).to_std()
                                     .unwrap_or(StdDuration::ZERO)
                                     .max(StdDuration::from_millis(10));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        tokio::pin!(work);
        loop {
            tokio::select! {
                out = &mut work => return Ok(out),
                _ = heartbeat.tick() => {
                    let lease = self.next_lease();
                    let id = run_id.to_string();
                    if !self.with_store(move |s| s.renew_lease(&id, &lease)).await? {
                        warn!("run {}: lease tomado por otro engine", run_id);
                        return Err(EngineError::LeaseLost(run_id.to_string()));
                    }
                }
            }
        }
    }

    /// Guarda el run con el lease renovado. Si el store ya lo tiene terminal
    /// con otro estado (una cancelación ganó la carrera), conserva ese estado
    /// y el progreso de los tasks. Si otro engine es el dueño, `LeaseLost`.
    async fn persist(&self, mut run: JobRun) -> Result<JobRun, EngineError> {
        run.lease = Some(self.next_lease());
        let snapshot = run.clone();
        match self.with_store(move |s| s.save_job_run(&snapshot)).await {
            Ok(()) => Ok(run),
            Err(StoreError::Conflict(reason)) => {
                debug!("run {}: {}", run.id, reason);
                let id = run.id.clone();
                let stored = self.with_store(move |s| s.job_run(&id)).await?;
                let foreign = stored.lease.as_ref().is_some_and(|l| l.owner != self.owner);
                if !stored.is_terminal() || foreign {
                    warn!("run {}: {}", run.id, reason);
                    return Err(EngineError::LeaseLost(run.id));
                }
                run.status = stored.status;
                run.result = stored.result;
                run.finished_at = stored.finished_at;
                let snapshot = run.clone();
                self.with_store(move |s| s.save_job_run(&snapshot)).await?;
                Ok(run)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn not_claimable(&self, run_id: &str) -> EngineError {
        let id = run_id.to_string();
        match self.with_store(move |s| s.job_run(&id)).await {
            Ok(current) => EngineError::NotClaimable { id: current.id,
                                                       status: current.status.to_string() },
            Err(e) => e.into(),
        }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
        where T: Send + 'static,
              F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&*store)).await
                                                      .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}
