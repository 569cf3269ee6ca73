//! Construcción de `ServiceAgreement` a partir de un request crudo.
//!
//! Cadena: parse → canonicalize → keccak(digest) → ABI(encumbrance) →
//! keccak(ABI ++ digest) → firma del ID. Los pasos hasta el ID son puros;
//! sólo la firma depende de material externo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use alloy_primitives::hex;

use super::{Encumbrance, OracleAddress, Payment, Signer};
use crate::constants::HEX_PREFIX;
use crate::errors::AgreementError;
use crate::hashing::{canonicalize, hash_hex};
use crate::model::{JobSpec, JobSpecRequest};

/// Request tal como llega por el wire: términos + forma del job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAgreementRequest {
    #[serde(default)]
    pub payment: Option<Payment>,
    #[serde(default)]
    pub expiration: u64,
    #[serde(default)]
    pub oracles: Vec<OracleAddress>,
    #[serde(flatten)]
    pub job: JobSpecRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAgreement {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub encumbrance: Encumbrance,
    /// Referencia (no propiedad) al JobSpec creado junto al agreement.
    #[serde(rename = "jobSpecID")]
    pub job_spec_id: String,
    /// Request canonicalizado, conservado para auditoría/replay.
    pub request_body: String,
    pub signature: String,
}

impl ServiceAgreement {
    /// Construye el agreement y el JobSpec asociado. No persiste nada.
    pub fn build(raw: &[u8], signer: &dyn Signer) -> Result<(Self, JobSpec), AgreementError> {
        let request: ServiceAgreementRequest =
            serde_json::from_slice(raw).map_err(|e| AgreementError::InvalidRequest(e.to_string()))?;
        let normalized = canonicalize(raw)?;
        let digest = request_digest(&normalized);

        let encumbrance = Encumbrance { payment: request.payment,
                                        expiration: request.expiration,
                                        oracles: request.oracles };
        let id = generate_id(&encumbrance, &digest)?;
        let signature = signer.sign(id.as_bytes())?;

        let spec = JobSpec::new(request.job);
        let agreement = Self { id,
                               created_at: Utc::now(),
                               encumbrance,
                               job_spec_id: spec.id.clone(),
                               request_body: normalized,
                               signature };
        Ok((agreement, spec))
    }

    /// Recalcula el ID desde `encumbrance` y `request_body`.
    pub fn verify_id(&self) -> Result<(), AgreementError> {
        let expected = generate_id(&self.encumbrance, &request_digest(&self.request_body))?;
        if expected != self.id {
            return Err(AgreementError::IdMismatch(self.id.clone()));
        }
        Ok(())
    }
}

/// Digest hex (`0x...`) del request normalizado.
pub fn request_digest(normalized: &str) -> String {
    hash_hex(normalized.as_bytes())
}

/// `keccak256(hexdecode(abi_hex(encumbrance) ++ digest))` como hex con prefijo.
///
/// El preimage se arma concatenando los dos strings hex (el digest sin su
/// prefijo) y decodificando el resultado: 64 bytes de encoding + 32 de digest.
pub fn generate_id(encumbrance: &Encumbrance, digest: &str) -> Result<String, AgreementError> {
    let digest = digest.strip_prefix(HEX_PREFIX).unwrap_or(digest);
    let preimage_hex = format!("{}{}", encumbrance.abi_hex(), digest);
    let preimage = hex::decode(&preimage_hex).map_err(|e| AgreementError::Encoding(e.to_string()))?;
    Ok(hash_hex(&preimage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SignerError;
    use serde_json::json;

    struct FailingSigner;

    impl Signer for FailingSigner {
        fn sign(&self, _input: &[u8]) -> Result<String, SignerError> {
            Err(SignerError::Rejected("locked keystore".into()))
        }
    }

    #[test]
    fn signing_failure_aborts_build() {
        let raw = json!({"payment": "1", "expiration": 300, "tasks": [{"type": "noop"}]}).to_string();
        let err = ServiceAgreement::build(raw.as_bytes(), &FailingSigner).unwrap_err();
        assert_eq!(err, AgreementError::SigningFailed(SignerError::Rejected("locked keystore".into())));
    }

    #[test]
    fn invalid_json_is_an_invalid_request() {
        let err = ServiceAgreement::build(b"{", &FailingSigner).unwrap_err();
        assert!(matches!(err, AgreementError::InvalidRequest(_)));
    }

    #[test]
    fn bad_digest_hex_is_an_encoding_error() {
        let err = generate_id(&Encumbrance::default(), "0xzz").unwrap_err();
        assert!(matches!(err, AgreementError::Encoding(_)));
    }
}
