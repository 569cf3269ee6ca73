use oracle_core::errors::{AgreementError, EngineError, ErrorDocument, JobError, StoreError};
use thiserror::Error;

use super::ConfigError;

/// Error de cualquier operación del nodo.
///
/// Los mensajes de las variantes internas se propagan sin decorar: son los
/// que la capa web entrega dentro de `{"errors":[...]}`.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Agreement(#[from] AgreementError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl NodeError {
    /// `true` para lookups de IDs inexistentes (404 en la capa web).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(e) | Self::Job(JobError::Store(e)) | Self::Engine(EngineError::Store(e)) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn to_document(&self) -> ErrorDocument {
        ErrorDocument::from_error(self)
    }
}
