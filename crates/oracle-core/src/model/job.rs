//! `JobSpec`, `TaskSpec` e `Initiator`.
//!
//! Un `JobSpec` es inmutable tras su creación: define cuándo se dispara un run
//! (initiators + ventana de validez) y qué pipeline ejecuta (tasks en orden).
//! Puede leerse desde cualquier número de workers sin sincronización.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::AdapterRegistry;
use crate::errors::JobError;
use crate::schedule::CronParser;

use super::new_id;

/// Descriptor de disparo de un job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Initiator {
    /// Run manual a través de la API.
    Web,
    /// Expresión cron (5 campos estándar, o 6/7 con segundos).
    Cron { schedule: String },
    /// Instantes fijos.
    RunAt { times: Vec<DateTime<Utc>> },
    /// Evento externo (p. ej. log on-chain) entregado por un colaborador.
    #[serde(alias = "ethLog")]
    ExternalEvent {
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        topics: Vec<String>,
    },
}

impl Initiator {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Cron { .. } => "cron",
            Self::RunAt { .. } => "runAt",
            Self::ExternalEvent { .. } => "externalEvent",
        }
    }
}

/// Un paso del pipeline: tipo de adapter + parámetros opacos.
///
/// En el wire los parámetros van planos junto a `type`:
/// `{"type": "httpGet", "endpoint": "https://..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl TaskSpec {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self { task_type: task_type.into(),
               params: Map::new() }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

/// Forma del job tal como llega en un request de creación.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpecRequest {
    #[serde(default)]
    pub initiators: Vec<Initiator>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub initiators: Vec<Initiator>,
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

impl JobSpec {
    /// Crea un JobSpec con identidad nueva a partir del request.
    pub fn new(request: JobSpecRequest) -> Self {
        Self { id: new_id(),
               created_at: Utc::now(),
               initiators: request.initiators,
               tasks: request.tasks,
               start_at: request.start_at,
               end_at: request.end_at }
    }

    /// Parsea el body de un request de creación.
    pub fn from_json(raw: &[u8]) -> Result<Self, JobError> {
        let request: JobSpecRequest =
            serde_json::from_slice(raw).map_err(|e| JobError::MalformedInput(e.to_string()))?;
        Ok(Self::new(request))
    }

    /// Valida invariantes antes de persistir:
    /// ventana coherente, al menos un task, todos los tipos de adapter
    /// registrados y schedules parseables.
    pub fn validate(&self, registry: &AdapterRegistry, cron: &dyn CronParser) -> Result<(), JobError> {
        if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
            if start > end {
                return Err(JobError::InvalidWindow);
            }
        }
        if self.tasks.is_empty() {
            return Err(JobError::NoTasks);
        }
        for task in &self.tasks {
            registry.resolve(&task.task_type)?;
        }
        for initiator in &self.initiators {
            match initiator {
                Initiator::Cron { schedule } => cron.validate(schedule).map_err(JobError::cron)?,
                Initiator::RunAt { times } if times.is_empty() => {
                    return Err(JobError::run_at("at least one time is required"))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// `true` si `at` cae dentro de `[start_at, end_at]` (extremos abiertos si
    /// faltan).
    pub fn in_window(&self, at: DateTime<Utc>) -> bool {
        self.start_at.map_or(true, |start| at >= start) && self.end_at.map_or(true, |end| at <= end)
    }

    pub fn has_web_initiator(&self) -> bool {
        self.initiators.iter().any(|i| matches!(i, Initiator::Web))
    }

    pub fn has_external_initiator(&self) -> bool {
        self.initiators.iter().any(|i| matches!(i, Initiator::ExternalEvent { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parses_wire_format_with_flat_task_params() {
        let raw = json!({
            "initiators": [{"type": "cron", "schedule": "* 7 * * *"}, {"type": "web"}],
            "tasks": [{"type": "httpGet", "endpoint": "https://bitstamp.net/api/ticker/"},
                      {"type": "jsonParse", "path": ["last"]}],
            "endAt": "2019-11-27T23:05:49Z"
        });
        let spec = JobSpec::from_json(raw.to_string().as_bytes()).expect("valid request");
        assert_eq!(spec.initiators[0], Initiator::Cron { schedule: "* 7 * * *".into() });
        assert!(spec.has_web_initiator());
        assert_eq!(spec.tasks[0].task_type, "httpGet");
        assert_eq!(spec.tasks[0].params["endpoint"], json!("https://bitstamp.net/api/ticker/"));
        assert_eq!(spec.tasks[1].params["path"], json!(["last"]));
        assert_eq!(spec.start_at, None);
        assert_eq!(spec.end_at, Some(Utc.with_ymd_and_hms(2019, 11, 27, 23, 5, 49).unwrap()));
    }

    #[test]
    fn external_event_accepts_eth_log_alias() {
        let i: Initiator = serde_json::from_value(json!({"type": "ethLog", "address": "0xabc"})).unwrap();
        assert_eq!(i.kind(), "externalEvent");
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = JobSpec::from_json(b"{\"tasks\": 3").unwrap_err();
        assert!(matches!(err, JobError::MalformedInput(_)));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut spec = JobSpec::new(JobSpecRequest::default());
        spec.start_at = Some(start);
        spec.end_at = Some(end);
        assert!(spec.in_window(start));
        assert!(spec.in_window(end));
        assert!(!spec.in_window(end + chrono::Duration::seconds(1)));
        assert!(!spec.in_window(start - chrono::Duration::seconds(1)));
    }

    #[test]
    fn ids_are_unique() {
        let a = JobSpec::new(JobSpecRequest::default());
        let b = JobSpec::new(JobSpecRequest::default());
        assert_ne!(a.id, b.id);
    }
}
