//! Materialización de disparos en `JobRun`s.
//!
//! Cron y run-at se evalúan sobre un intervalo `(from, to]`; web y eventos
//! externos sólo mediante `trigger`. La ventana `[start_at, end_at]` del
//! JobSpec se aplica por instante y los disparos fuera de ella se descartan
//! sin error. Un mismo `(job_spec_id, instante)` produce siempre el mismo run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::watch;

use super::CronParser;
use crate::constants::MAX_CRON_CATCHUP;
use crate::engine::RunQueue;
use crate::errors::{JobError, StoreError};
use crate::model::{Initiator, JobRun, JobSpec};
use crate::store::Store;

/// Origen de un disparo explícito.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Web,
    External,
}

impl TriggerSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::External => "external",
        }
    }
}

/// Resultado de evaluar un intervalo.
#[derive(Debug, Default)]
pub struct Tick {
    /// Runs nuevos, listos para encolar.
    pub created: Vec<JobRun>,
    /// `(job_spec_id, error)` de los JobSpecs que no se pudieron evaluar.
    pub errors: Vec<(String, StoreError)>,
}

impl Tick {
    /// `true` si todos los JobSpecs se evaluaron sin error.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Scheduler<S: Store> {
    store: Arc<S>,
    cron: Arc<dyn CronParser>,
}

impl<S: Store> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store),
               cron: Arc::clone(&self.cron) }
    }
}

impl<S: Store> Scheduler<S> {
    pub fn new(store: Arc<S>, cron: Arc<dyn CronParser>) -> Self {
        Self { store, cron }
    }

    /// Instantes programados de `spec` en `(from, to]`, ordenados y sin
    /// duplicados. No aplica la ventana de validez.
    pub fn due_instants(&self, spec: &JobSpec, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut due = Vec::new();
        for initiator in &spec.initiators {
            match initiator {
                Initiator::Cron { schedule } => {
                    let mut cursor = from;
                    while due.len() < MAX_CRON_CATCHUP {
                        match self.cron.next_fire_time(schedule, cursor) {
                            Ok(next) if next <= to => {
                                due.push(next);
                                cursor = next;
                            }
                            Ok(_) => break,
                            Err(e) => {
                                warn!("job {}: cron {:?} no evaluable: {}", spec.id, schedule, e);
                                break;
                            }
                        }
                    }
                }
                Initiator::RunAt { times } => due.extend(times.iter().copied().filter(|t| *t > from && *t <= to)),
                Initiator::Web | Initiator::ExternalEvent { .. } => {}
            }
        }
        due.sort();
        due.dedup();
        due
    }

    /// Crea los runs programados de todos los JobSpecs para `(from, to]`.
    ///
    /// Un error del store en un JobSpec no corta el tick: se registra en
    /// `Tick::errors` y se sigue con el resto, así los runs ya insertados
    /// siempre llegan a `created`. Reevaluar el intervalo sólo crea lo que
    /// falta.
    pub fn tick(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Tick, StoreError> {
        let mut tick = Tick::default();
        for spec in self.store.job_specs()? {
            if let Err(e) = self.tick_spec(&spec, from, to, &mut tick.created) {
                warn!("job {}: tick incompleto: {}", spec.id, e);
                tick.errors.push((spec.id.clone(), e));
            }
        }
        Ok(tick)
    }

    fn tick_spec(&self,
                 spec: &JobSpec,
                 from: DateTime<Utc>,
                 to: DateTime<Utc>,
                 created: &mut Vec<JobRun>)
                 -> Result<(), StoreError> {
        for instant in self.due_instants(spec, from, to) {
            if !spec.in_window(instant) {
                debug!("job {}: disparo {} fuera de ventana, descartado", spec.id, instant);
                continue;
            }
            let run = JobRun::scheduled(spec, instant);
            if self.store.insert_job_run(&run)? {
                debug!("job {}: run {} creado para {}", spec.id, run.id, instant);
                created.push(run);
            }
        }
        Ok(())
    }

    /// Disparo explícito. `Ok(None)` si `now` cae fuera de la ventana.
    pub fn trigger(&self,
                   spec_id: &str,
                   source: TriggerSource,
                   input: Value,
                   now: DateTime<Utc>)
                   -> Result<Option<JobRun>, JobError> {
        let spec = self.store.job_spec(spec_id)?;
        let allowed = match source {
            TriggerSource::Web => spec.has_web_initiator(),
            TriggerSource::External => spec.has_external_initiator(),
        };
        if !allowed {
            return Err(JobError::InitiatorNotAllowed(spec.id, source.as_str()));
        }
        if !spec.in_window(now) {
            debug!("job {}: disparo {} fuera de ventana, descartado", spec.id, source.as_str());
            return Ok(None);
        }
        let run = JobRun::new(&spec, input);
        self.store.save_job_run(&run)?;
        Ok(Some(run))
    }
}

impl<S: Store + 'static> Scheduler<S> {
    /// Loop de ticks hasta que `shutdown` pase a `true`. Cada tick corre en
    /// `spawn_blocking` porque el store es síncrono. Los runs creados se
    /// encolan siempre; si el tick tuvo errores el intervalo se reevalúa
    /// completo en el siguiente.
    pub async fn run(&self, queue: RunQueue, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut last = Utc::now();
        let mut ticker = tokio::time::interval(every);
        info!("scheduler iniciado (intervalo {:?})", every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let scheduler = self.clone();
                    match tokio::task::spawn_blocking(move || scheduler.tick(last, now)).await {
                        Ok(Ok(tick)) => {
                            for run in &tick.created {
                                if queue.enqueue(&run.id).is_err() {
                                    warn!("cola de runs cerrada; scheduler detenido");
                                    return;
                                }
                            }
                            if tick.is_complete() {
                                last = now;
                            }
                        }
                        Ok(Err(e)) => warn!("tick del scheduler falló: {}", e),
                        Err(e) => warn!("tick del scheduler abortado: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler detenido");
    }
}
