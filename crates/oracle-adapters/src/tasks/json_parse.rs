//! `jsonParse`: recorre `path` dentro del input.
//!
//! El input puede ser un documento JSON o un string que lo contenga (el body
//! de `httpGet`). Cada segmento del path es una clave de objeto o un índice
//! de array.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use oracle_core::{Adapter, AdapterError};

use crate::params::parse_params;

#[derive(Debug, Deserialize)]
struct JsonParseParams {
    path: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParse;

#[async_trait]
impl Adapter for JsonParse {
    async fn perform(&self, input: &Value, params: &Map<String, Value>) -> Result<Value, AdapterError> {
        let JsonParseParams { path } = parse_params(params)?;
        let document = match input {
            Value::String(body) => {
                serde_json::from_str(body).map_err(|e| AdapterError::InvalidInput(format!("not JSON: {e}")))?
            }
            other => other.clone(),
        };

        let mut current = &document;
        for segment in &path {
            current = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }.ok_or_else(|| AdapterError::Execution(format!("no value at path {}", path.join("."))))?;
        }
        Ok(current.clone())
    }
}
