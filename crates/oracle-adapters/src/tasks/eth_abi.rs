//! Formateo de valores como palabras ABI de 32 bytes (`0x` + 64 hex).

use async_trait::async_trait;
use alloy_primitives::{hex, U256};
use serde_json::{Map, Value};

use oracle_core::{Adapter, AdapterError};

/// `ethUint256`: número no negativo → uint256 big-endian. La parte decimal se
/// trunca.
#[derive(Debug, Default, Clone, Copy)]
pub struct EthUint256;

/// `ethBytes32`: string → bytes UTF-8 alineados a la izquierda y rellenados
/// con ceros a 32 bytes. Los strings más largos se truncan.
#[derive(Debug, Default, Clone, Copy)]
pub struct EthBytes32;

fn parse_uint(input: &Value) -> Result<U256, AdapterError> {
    let invalid = || AdapterError::InvalidInput(format!("not a non-negative number: {input}"));
    match input {
        Value::Number(n) => match n.as_u64() {
            Some(u) => Ok(U256::from(u)),
            None => {
                let f = n.as_f64().ok_or_else(invalid)?;
                if f < 0.0 || !f.is_finite() {
                    return Err(invalid());
                }
                U256::from_str_radix(&format!("{:.0}", f.trunc()), 10).map_err(|_| invalid())
            }
        },
        Value::String(s) => {
            let s = s.trim();
            let integer = s.split_once('.').map_or(s, |(int, _)| int);
            U256::from_str_radix(integer, 10).map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

#[async_trait]
impl Adapter for EthUint256 {
    async fn perform(&self, input: &Value, _params: &Map<String, Value>) -> Result<Value, AdapterError> {
        let n = parse_uint(input)?;
        Ok(Value::String(hex::encode_prefixed(n.to_be_bytes::<32>())))
    }
}

#[async_trait]
impl Adapter for EthBytes32 {
    async fn perform(&self, input: &Value, _params: &Map<String, Value>) -> Result<Value, AdapterError> {
        let text = match input {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => return Err(AdapterError::InvalidInput(format!("cannot encode {other} as bytes32"))),
        };
        let mut word = [0u8; 32];
        let bytes = text.as_bytes();
        let len = bytes.len().min(32);
        word[..len].copy_from_slice(&bytes[..len]);
        Ok(Value::String(hex::encode_prefixed(word)))
    }
}
