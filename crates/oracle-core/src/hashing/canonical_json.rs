//! JSON canónico: claves de objetos ordenadas (orden de bytes UTF-8), sin
//! espacios y con la representación de números/strings de `serde_json`.
//!
//! Se recorre el documento como `RawValue` para no pasar los números por
//! `f64`: un entero fuera de rango `i64`/`u64` conserva su literal.
//!
//! El resultado es la forma normalizada de un request; su hash es el digest
//! que entra en el ID de un service agreement.

use std::collections::BTreeMap;

use serde_json::value::RawValue;
use serde_json::{Number, Value};

use crate::errors::AgreementError;

/// Canonicaliza bytes arbitrarios. Falla con `MalformedInput` si no son JSON
/// válido. Idempotente: `canonicalize(canonicalize(x)) == canonicalize(x)`.
pub fn canonicalize(raw: &[u8]) -> Result<String, AgreementError> {
    let text = std::str::from_utf8(raw).map_err(|e| AgreementError::MalformedInput(e.to_string()))?;
    let root: &RawValue = serde_json::from_str(text).map_err(malformed)?;
    let mut out = String::with_capacity(text.len());
    write_canonical(root, &mut out).map_err(malformed)?;
    Ok(out)
}

fn malformed(e: serde_json::Error) -> AgreementError {
    AgreementError::MalformedInput(e.to_string())
}

fn write_canonical(raw: &RawValue, out: &mut String) -> Result<(), serde_json::Error> {
    let text = raw.get().trim();
    match text.as_bytes().first() {
        Some(b'{') => {
            let fields: BTreeMap<String, &RawValue> = serde_json::from_str(text)?;
            out.push('{');
            for (i, (key, value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(value, out)?;
            }
            out.push('}');
        }
        Some(b'[') => {
            let items: Vec<&RawValue> = serde_json::from_str(text)?;
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Some(b'"') => {
            let s: String = serde_json::from_str(text)?;
            out.push_str(&Value::String(s).to_string());
        }
        Some(b'-' | b'0'..=b'9') => out.push_str(&number_token(text)?),
        // true / false / null
        _ => out.push_str(text),
    }
    Ok(())
}

/// Enteros y floats se renderizan como `serde_json`; un entero que no cabe
/// en 64 bits se copia tal cual.
fn number_token(token: &str) -> Result<String, serde_json::Error> {
    let n: Number = serde_json::from_str(token)?;
    if n.is_f64() && !token.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        return Ok(token.to_string());
    }
    Ok(n.to_string())
}
