//! `Encumbrance`: términos comerciales de un service agreement y su encoding
//! ABI de ancho fijo.
//!
//! El encoding es `uint256(payment) ++ uint256(expiration)`, big-endian, 64
//! bytes. Los oráculos NO participan del encoding aunque se persisten en el
//! agreement: el contrato on-chain recalcula el ID sólo con estos dos campos.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{hex, Address, U256};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{ABI_WORD_BYTES, ENCUMBRANCE_ABI_BYTES};

/// Monto de tokens no negativo (uint256). Se acepta en el wire como número
/// entero o string decimal (`"0x"` para hex); se serializa como string
/// decimal para no perder precisión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Payment(pub U256);

impl Payment {
    pub fn new(amount: u64) -> Self {
        Self(U256::from(amount))
    }
}

impl FromStr for Payment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x") {
            Some(hex_digits) => U256::from_str_radix(hex_digits, 16),
            None => U256::from_str_radix(s, 10),
        };
        parsed.map(Self).map_err(|e| format!("invalid payment {s:?}: {e}"))
    }
}

impl fmt::Display for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Payment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Payment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PaymentVisitor;

        impl<'de> Visitor<'de> for PaymentVisitor {
            type Value = Payment;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Payment, E> {
                Ok(Payment::new(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Payment, E> {
                u64::try_from(v).map(Payment::new)
                                .map_err(|_| E::custom(format!("payment must be non-negative, got {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Payment, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PaymentVisitor)
    }
}

/// Dirección de oráculo validada con checksum EIP-55.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OracleAddress(pub Address);

impl FromStr for OracleAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse_checksummed(s, None).map(Self)
                                           .map_err(|e| format!("invalid EIP55 address {s:?}: {e}"))
    }
}

impl fmt::Display for OracleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_checksum(None))
    }
}

impl Serialize for OracleAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OracleAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encumbrance {
    #[serde(default)]
    pub payment: Option<Payment>,
    #[serde(default)]
    pub expiration: u64,
    /// El orden es significativo y se conserva tal como llegó.
    #[serde(default)]
    pub oracles: Vec<OracleAddress>,
}

impl Encumbrance {
    /// Encoding ABI: `payment` (0 si falta) y `expiration` como uint256
    /// big-endian.
    pub fn abi_encode(&self) -> [u8; ENCUMBRANCE_ABI_BYTES] {
        let payment = self.payment.unwrap_or_default().0;
        let expiration = U256::from(self.expiration);
        let mut out = [0u8; ENCUMBRANCE_ABI_BYTES];
        out[..ABI_WORD_BYTES].copy_from_slice(&payment.to_be_bytes::<ABI_WORD_BYTES>());
        out[ABI_WORD_BYTES..].copy_from_slice(&expiration.to_be_bytes::<ABI_WORD_BYTES>());
        out
    }

    /// Encoding ABI como hex en minúsculas, sin prefijo (128 caracteres).
    pub fn abi_hex(&self) -> String {
        hex::encode(self.abi_encode())
    }
}
