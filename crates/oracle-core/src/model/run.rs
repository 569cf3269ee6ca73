//! `JobRun` y `TaskRun`: registro de ejecución de un `JobSpec`.
//!
//! Un `JobRun` crea todos sus `TaskRun` por adelantado en `Pending` y los muta
//! en sitio a medida que avanza el pipeline. Ninguna otra entidad modifica los
//! `TaskRun` de un run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hashing::hash_str;

use super::{new_id, JobSpec, RunStatus, TaskSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub id: String,
    /// Copia del `TaskSpec`; el run no necesita volver a cargar su JobSpec.
    pub task: TaskSpec,
    pub status: RunStatus,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskRun {
    pub fn new(task: TaskSpec) -> Self {
        Self { id: new_id(),
               task,
               status: RunStatus::Pending,
               input: None,
               result: None,
               error: None }
    }

    pub fn start(&mut self, input: Value) {
        self.status = RunStatus::InProgress;
        self.input = Some(input);
        self.result = None;
        self.error = None;
    }

    pub fn complete(&mut self, result: Value) {
        self.status = RunStatus::Completed;
        self.result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Errored;
        self.result = None;
        self.error = Some(error.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: String,
    pub job_spec_id: String,
    pub status: RunStatus,
    pub task_runs: Vec<TaskRun>,
    /// Payload del disparo; input del primer task.
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub result: Option<Value>,
    /// Clave de idempotencia `(job_spec_id, instante)` para runs programados.
    #[serde(default)]
    pub trigger_key: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Engine que conduce el run mientras está `InProgress`.
    #[serde(default)]
    pub lease: Option<Lease>,
}

/// Propiedad temporal de un run `InProgress`. El dueño la renueva mientras
/// avanza; vencida, otro engine puede reclamar el run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub owner: String,
    pub until: DateTime<Utc>,
}

impl Lease {
    pub fn new(owner: impl Into<String>, until: DateTime<Utc>) -> Self {
        Self { owner: owner.into(),
               until }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.until <= now
    }
}

impl JobRun {
    /// Run disparado explícitamente (web / evento externo).
    pub fn new(spec: &JobSpec, input: Value) -> Self {
        Self { id: new_id(),
               job_spec_id: spec.id.clone(),
               status: RunStatus::Pending,
               task_runs: spec.tasks.iter().cloned().map(TaskRun::new).collect(),
               input,
               result: None,
               trigger_key: None,
               created_at: Utc::now(),
               finished_at: None,
               lease: None }
    }

    /// Run programado para `instant`. El ID se deriva de la clave de disparo,
    /// así reevaluar el mismo tick produce el mismo run.
    pub fn scheduled(spec: &JobSpec, instant: DateTime<Utc>) -> Self {
        let key = trigger_key(&spec.id, instant);
        let mut run = Self::new(spec, Value::Null);
        run.id = hash_str(&key)[2..34].to_string();
        run.trigger_key = Some(key);
        run
    }

    /// Índice del primer `TaskRun` no terminal, o `None` si todos terminaron.
    pub fn next_task_index(&self) -> Option<usize> {
        self.task_runs.iter().position(|t| !t.status.is_terminal())
    }

    /// Input del task `index`: el payload del disparo para el primero, el
    /// resultado del anterior para el resto.
    pub fn input_for(&self, index: usize) -> Value {
        if index == 0 {
            return self.input.clone();
        }
        self.task_runs
            .get(index - 1)
            .and_then(|t| t.result.clone())
            .unwrap_or(Value::Null)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.status = RunStatus::Completed;
        self.result = self.task_runs.last().and_then(|t| t.result.clone());
        self.finished_at = Some(at);
    }

    pub fn mark_errored(&mut self, at: DateTime<Utc>) {
        self.status = RunStatus::Errored;
        self.finished_at = Some(at);
    }

    pub fn mark_cancelled(&mut self, at: DateTime<Utc>) {
        self.status = RunStatus::Cancelled;
        self.finished_at = Some(at);
    }
}

/// Transiciones de propiedad. Los stores las aplican con el run bloqueado,
/// así cada una es un compare-and-swap.
impl JobRun {
    /// `Pending -> InProgress` con `lease`. `false` si el run no está `Pending`.
    pub fn try_claim(&mut self, lease: &Lease) -> bool {
        if self.status != RunStatus::Pending {
            return false;
        }
        self.status = RunStatus::InProgress;
        self.lease = Some(lease.clone());
        true
    }

    /// Toma un run `InProgress` cuyo lease venció (o que nunca tuvo uno).
    pub fn try_reclaim(&mut self, lease: &Lease, now: DateTime<Utc>) -> bool {
        if self.status != RunStatus::InProgress {
            return false;
        }
        if self.lease.as_ref().is_some_and(|held| !held.is_expired(now)) {
            return false;
        }
        self.lease = Some(lease.clone());
        true
    }

    /// Extiende el lease si `lease.owner` sigue siendo el dueño. Un run ya
    /// terminal no se toca pero cuenta como propio.
    pub fn try_renew(&mut self, lease: &Lease) -> bool {
        if !self.is_owned_by(&lease.owner) {
            return false;
        }
        if !self.is_terminal() {
            self.lease = Some(lease.clone());
        }
        true
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.lease.as_ref().is_some_and(|l| l.owner == owner)
    }

    /// Motivo por el que `incoming` no puede sobrescribir este run, si lo hay:
    /// un run terminal no cambia de estado y un run con dueño sólo lo escribe
    /// ese dueño.
    pub fn overwrite_conflict(&self, incoming: &JobRun) -> Option<String> {
        if self.is_terminal() {
            if self.status != incoming.status {
                return Some(format!("job run {} is already {}", self.id, self.status));
            }
            return None;
        }
        match (&self.lease, &incoming.lease) {
            (Some(held), Some(theirs)) if held.owner != theirs.owner => {
                Some(format!("job run {} is owned by {}", self.id, held.owner))
            }
            (Some(held), None) => Some(format!("job run {} is owned by {}", self.id, held.owner)),
            _ => None,
        }
    }
}

pub fn trigger_key(job_spec_id: &str, instant: DateTime<Utc>) -> String {
    format!("{}@{}", job_spec_id, instant.timestamp())
}
