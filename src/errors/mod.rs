//! Errores del nodo.

pub mod config_error;
pub mod node_error;

pub use config_error::ConfigError;
pub use node_error::NodeError;
