//! Constantes del núcleo.
//!
//! Algunos de estos valores forman parte del contrato on-chain (ancho de
//! palabra ABI, prefijo hex). Cambiarlos altera los IDs derivados de los
//! service agreements y rompe la verificación en el contrato.

/// Prefijo convencional de strings hexadecimales.
pub const HEX_PREFIX: &str = "0x";

/// Ancho de una palabra ABI (uint256) en bytes.
pub const ABI_WORD_BYTES: usize = 32;

/// Longitud del encoding ABI de un `Encumbrance` (payment + expiration).
pub const ENCUMBRANCE_ABI_BYTES: usize = 2 * ABI_WORD_BYTES;

/// Máximo de disparos cron que el scheduler materializa por job en un solo
/// tick. Evita loops largos tras una parada prolongada del nodo.
pub const MAX_CRON_CATCHUP: usize = 1024;

/// Duración del lease de un run `InProgress`, en segundos. El engine dueño lo
/// renueva en cada transición y periódicamente durante un task.
pub const RUN_LEASE_SECS: i64 = 30;
