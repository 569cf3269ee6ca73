//! Errores del núcleo.
//!
//! Cada enum cubre una preocupación concreta. Los mensajes de
//! `JobError::UnsupportedAdapterType` y `JobError::InvalidSchedule` son parte
//! del contrato externo: la capa web los devuelve tal cual dentro de un
//! `ErrorDocument`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errores de creación/validación de un `JobSpec` y de disparo de runs.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum JobError {
    #[error("{0}")]
    MalformedInput(String),
    #[error("{0} is not a supported adapter type")]
    UnsupportedAdapterType(String),
    #[error("{0}")]
    InvalidSchedule(String),
    #[error("job must have at least one task")]
    NoTasks,
    #[error("startAt must not be after endAt")]
    InvalidWindow,
    #[error("job {0} has no initiator for {1} triggers")]
    InitiatorNotAllowed(String, &'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl JobError {
    /// Error de schedule cron con el mensaje del parser embebido.
    pub fn cron(message: impl std::fmt::Display) -> Self {
        Self::InvalidSchedule(format!("Cron: {message}"))
    }

    /// Error de schedule run-at.
    pub fn run_at(message: impl std::fmt::Display) -> Self {
        Self::InvalidSchedule(format!("RunAt: {message}"))
    }
}

/// Errores del parser cron.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ScheduleError {
    /// Mensaje del parser tal cual; `JobError::cron` le antepone `Cron: `.
    #[error("{0}")]
    InvalidCron(String),
    #[error("schedule {0:?} has no upcoming fire time")]
    Exhausted(String),
}

/// Errores al construir un `ServiceAgreement`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AgreementError {
    #[error("invalid service agreement request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    MalformedInput(String),
    #[error("invalid agreement preimage: {0}")]
    Encoding(String),
    #[error("signing failed: {0}")]
    SigningFailed(#[from] SignerError),
    #[error("service agreement id {0} does not match its encumbrance and request body")]
    IdMismatch(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SignerError {
    #[error("{0}")]
    Rejected(String),
}

/// Fallo de un adapter durante la ejecución de un `TaskRun`.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum AdapterError {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Execution(String),
}

/// Errores del contrato de persistencia.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("store backend: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errores del motor de ejecución. Los fallos de adapters NO llegan aquí:
/// quedan registrados en el `TaskRun` y el `JobRun` pasa a `Errored`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EngineError {
    #[error("job run {id} cannot be driven from status {status}")]
    NotClaimable { id: String, status: String },
    #[error("run queue closed")]
    QueueClosed,
    #[error("job run {0} was claimed by another engine")]
    LeaseLost(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Documento de error que la capa web devuelve al cliente:
/// `{"errors":["..."]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub errors: Vec<String>,
}

impl ErrorDocument {
    pub fn new(message: impl Into<String>) -> Self {
        Self { errors: vec![message.into()] }
    }

    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::new(err.to_string())
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "errors": self.errors }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_adapter_document_is_verbatim() {
        let err = JobError::UnsupportedAdapterType("IdoNotExist".into());
        assert_eq!(ErrorDocument::from_error(&err).to_json(),
                   r#"{"errors":["IdoNotExist is not a supported adapter type"]}"#);
    }

    #[test]
    fn cron_error_embeds_parser_message() {
        let err = JobError::cron("Failed to parse int from !");
        assert_eq!(ErrorDocument::from_error(&err).to_json(),
                   r#"{"errors":["Cron: Failed to parse int from !"]}"#);
    }

    #[test]
    fn store_not_found_format() {
        let err = StoreError::not_found("job spec", "garbage");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "job spec not found: garbage");
    }
}
