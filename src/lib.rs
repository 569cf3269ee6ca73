//! oracle-node
//!
//! Nodo oráculo: crea JobSpecs y service agreements, programa runs y los
//! ejecuta con los adapters incorporados.
//!
//! - `config`: `NodeConfig` desde variables de entorno / `.env`.
//! - `errors`: `NodeError` y `ConfigError`.
//! - `node`: `OracleNode`, el contexto que expone todas las operaciones.

pub mod config;
pub mod errors;
pub mod node;

pub use config::NodeConfig;
pub use errors::{ConfigError, NodeError};
pub use node::OracleNode;
