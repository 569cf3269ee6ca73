//! Hash de contenido: Keccak-256, el mismo que recalcula el contrato on-chain.

use alloy_primitives::{hex, keccak256, B256};

/// Digest crudo de 32 bytes.
pub fn hash_bytes(input: &[u8]) -> B256 {
    keccak256(input)
}

/// Digest como string hex en minúsculas con prefijo `0x` (66 caracteres).
pub fn hash_hex(input: &[u8]) -> String {
    hex::encode_prefixed(keccak256(input))
}

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    hash_hex(input.as_bytes())
}

