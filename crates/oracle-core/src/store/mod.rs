//! Contrato de persistencia del núcleo.
//!
//! El motor sólo depende de este trait: upsert por ID, lectura por ID y
//! consultas por igualdad de campo ordenadas por `created_at`. Además expone
//! las dos operaciones atómicas que el modelo de concurrencia necesita:
//! `claim_job_run` (CAS `Pending -> InProgress`), `reclaim_job_run` (toma de
//! runs con lease vencido) y `cancel_job_run`.
//!
//! Implementaciones: `InMemoryStore` (aquí) y `PgStore` (crate de
//! persistencia).

mod memory;

pub use memory::InMemoryStore;

use crate::agreement::ServiceAgreement;
use crate::errors::StoreError;
use chrono::{DateTime, Utc};

use crate::model::{JobRun, JobSpec, Lease, RunStatus};

/// Filtro de igualdad sobre runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFilter {
    JobSpecId(String),
    Status(RunStatus),
    TriggerKey(String),
}

impl RunFilter {
    pub fn matches(&self, run: &JobRun) -> bool {
        match self {
            Self::JobSpecId(id) => &run.job_spec_id == id,
            Self::Status(status) => run.status == *status,
            Self::TriggerKey(key) => run.trigger_key.as_deref() == Some(key.as_str()),
        }
    }
}

pub trait Store: Send + Sync {
    fn save_job_spec(&self, spec: &JobSpec) -> Result<(), StoreError>;

    /// `StoreError::NotFound` si no existe; nunca un registro vacío.
    fn job_spec(&self, id: &str) -> Result<JobSpec, StoreError>;

    /// Todos los JobSpecs, ordenados por `created_at`.
    fn job_specs(&self) -> Result<Vec<JobSpec>, StoreError>;

    /// Upsert de un run. Devuelve `StoreError::Conflict` si el run almacenado
    /// ya es terminal con otro estado (p. ej. cancelado mientras un adapter
    /// estaba en vuelo) o si lo conduce otro engine
    /// (`JobRun::overwrite_conflict`).
    fn save_job_run(&self, run: &JobRun) -> Result<(), StoreError>;

    /// Inserta sólo si el ID no existe. `Ok(false)` si ya existía.
    fn insert_job_run(&self, run: &JobRun) -> Result<bool, StoreError>;

    fn job_run(&self, id: &str) -> Result<JobRun, StoreError>;

    /// Runs que cumplen `filter`, ordenados por `created_at`.
    fn job_runs(&self, filter: &RunFilter) -> Result<Vec<JobRun>, StoreError>;

    /// Compare-and-swap `Pending -> InProgress` tomando `lease`. `Ok(None)` si
    /// el run no está `Pending` (otro engine lo reclamó o ya terminó).
    fn claim_job_run(&self, id: &str, lease: &Lease) -> Result<Option<JobRun>, StoreError>;

    /// Toma un run `InProgress` cuyo lease venció en `now`. `Ok(None)` si otro
    /// engine lo conduce todavía o si ya no está `InProgress`.
    fn reclaim_job_run(&self, id: &str, lease: &Lease, now: DateTime<Utc>) -> Result<Option<JobRun>, StoreError>;

    /// Extiende el lease del dueño. `Ok(false)` si el run cambió de dueño.
    fn renew_lease(&self, id: &str, lease: &Lease) -> Result<bool, StoreError>;

    /// Marca el run `Cancelled` si aún no es terminal. `Ok(false)` si ya lo era.
    fn cancel_job_run(&self, id: &str) -> Result<bool, StoreError>;

    /// Persiste agreement y JobSpec juntos (todo o nada).
    fn create_service_agreement(&self, agreement: &ServiceAgreement, spec: &JobSpec) -> Result<(), StoreError>;

    fn service_agreement(&self, id: &str) -> Result<ServiceAgreement, StoreError>;
}
