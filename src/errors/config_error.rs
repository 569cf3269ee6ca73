use thiserror::Error;

/// Errores de configuración del nodo.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Valor inválido para {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Falta la variable {0}")]
    Missing(&'static str),
    #[error("Secreto de firma inválido: {0}")]
    Signer(String),
}
