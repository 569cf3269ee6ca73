//! Parámetros tipados de un `TaskSpec`.
//!
//! Los params llegan como un mapa JSON opaco; cada adapter declara su propio
//! struct y lo extrae con `parse_params`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use oracle_core::AdapterError;

pub fn parse_params<P: DeserializeOwned>(params: &Map<String, Value>) -> Result<P, AdapterError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|e| AdapterError::InvalidParams(e.to_string()))
}

/// Número desde un `Value` numérico o un string decimal.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Params numéricos que pueden venir como número o como string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Numeric(pub f64);

impl<'de> serde::Deserialize<'de> for Numeric {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        as_f64(&value).map(Numeric)
                      .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {value}")))
    }
}
