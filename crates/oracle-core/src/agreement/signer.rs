//! Firma de IDs de agreement.
//!
//! El núcleo no sabe cómo se guarda la clave: recibe un `Signer` inyectado.
//! `HmacSigner` es la implementación por defecto del binario.

use alloy_primitives::hex;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::SignerError;

type HmacSha256 = Hmac<Sha256>;

pub trait Signer: Send + Sync {
    /// Firma `input` y devuelve la firma como string.
    fn sign(&self, input: &[u8]) -> Result<String, SignerError>;
}

/// HMAC-SHA256 con un secreto del nodo. Salida hex con prefijo `0x`.
#[derive(Clone)]
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl HmacSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SignerError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SignerError::Rejected("signer secret must not be empty".into()));
        }
        Ok(Self { secret: secret.to_vec() })
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HmacSigner { .. }")
    }
}

impl Signer for HmacSigner {
    fn sign(&self, input: &[u8]) -> Result<String, SignerError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|e| SignerError::Rejected(e.to_string()))?;
        mac.update(input);
        Ok(hex::encode_prefixed(mac.finalize().into_bytes()))
    }
}
