//! `multiply`: input numérico por `times`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use oracle_core::{Adapter, AdapterError};

use crate::params::{as_f64, parse_params, Numeric};

#[derive(Debug, Deserialize)]
struct MultiplyParams {
    times: Numeric,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Multiply;

#[async_trait]
impl Adapter for Multiply {
    async fn perform(&self, input: &Value, params: &Map<String, Value>) -> Result<Value, AdapterError> {
        let MultiplyParams { times: Numeric(times) } = parse_params(params)?;
        let value = as_f64(input).ok_or_else(|| AdapterError::InvalidInput(format!("not a number: {input}")))?;
        let product = value * times;
        // Enteros exactos se emiten como enteros (p. ej. 8225.0 * 100 -> 822500).
        if product.fract() == 0.0 {
            if (0.0..u64::MAX as f64).contains(&product) {
                return Ok(Value::from(product as u64));
            }
            if (i64::MIN as f64..0.0).contains(&product) {
                return Ok(Value::from(product as i64));
            }
        }
        Number::from_f64(product).map(Value::Number)
                                 .ok_or_else(|| AdapterError::Execution(format!("{value} * {times} is not finite")))
    }
}
