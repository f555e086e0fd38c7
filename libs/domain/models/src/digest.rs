// [libs/domain/models/src/digest.rs]
//! =================================================================
//! APARATO: CONTENT DIGEST UTILITY (V3.0)
//! CLASIFICACIÓN: DOMAIN UTILITY (ESTRATO L2)
//! RESPONSABILIDAD: HUELLAS SHA-256 PARA SECRETOS Y CONTENIDO DE SCAN
//! =================================================================

use sha2::{Digest, Sha256};

/// Produce la huella SHA-256 en formato hexadecimal minúsculo.
///
/// Uso dual: sellado de contenido de dependencias (idempotencia de scans)
/// y digestión de secretos (tokens de enrolamiento, credenciales), de modo
/// que ningún material sensible repose en claro en el Ledger.
pub fn sha256_hexadecimal_digest(material: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(material);
    hex::encode(hasher.finalize())
}
