//! Contrato de adapters y registro por nombre de tipo.
//!
//! Un adapter ejecuta un paso del pipeline: recibe el output del paso
//! anterior y los params del `TaskSpec`. Es el único punto del motor que puede
//! bloquear (red, lecturas on-chain), por eso es async.

mod registry;

pub use registry::AdapterRegistry;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::AdapterError;

#[async_trait]
pub trait Adapter: Send + Sync {
    async fn perform(&self, input: &Value, params: &Map<String, Value>) -> Result<Value, AdapterError>;
}
