//! Módulo de hashing y canonicalización JSON.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::canonicalize;
pub use hash::{hash_bytes, hash_hex, hash_str};
