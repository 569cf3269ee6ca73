use async_trait::async_trait;
use serde_json::{Map, Value};

use oracle_core::{Adapter, AdapterError};

/// Devuelve el input sin cambios.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOp;

#[async_trait]
impl Adapter for NoOp {
    async fn perform(&self, input: &Value, _params: &Map<String, Value>) -> Result<Value, AdapterError> {
        Ok(input.clone())
    }
}
