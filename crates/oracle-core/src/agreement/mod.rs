//! Service agreements: identidad determinista + firma del nodo.

mod encumbrance;
mod service_agreement;
mod signer;

pub use encumbrance::{Encumbrance, OracleAddress, Payment};
pub use service_agreement::{generate_id, request_digest, ServiceAgreement, ServiceAgreementRequest};
pub use signer::{HmacSigner, Signer};
