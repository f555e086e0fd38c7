// [libs/domain/models/src/tenant.rs]
/*!
 * =================================================================
 * APARATO: TENANT DOMAIN MODELS (V3.1 - ISOLATION CONTRACTS)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: DEFINICIÓN DE LA FRONTERA DE AISLAMIENTO MULTI-TENANT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ISOLATION BOUNDARY: Toda entidad persistida del pipeline porta
 *    exactamente un 'tenant_id'; ninguna referencia cruza tenants.
 * 2. SECRET HYGIENE: El token de enrolamiento jamás reposa en claro;
 *    el modelo transporta únicamente su huella SHA-256.
 * 3. NOMINAL PURITY: Nomenclatura nominal absoluta en todos los campos.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estados operativos de un tenant en el registro soberano.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    /// El tenant acepta enrolamientos y reportes de agentes.
    Active,
    /// El tenant está suspendido; toda operación autenticada es rechazada.
    Suspended,
}

/// Entidad raíz de la frontera de aislamiento.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub display_name: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
}

/// Token de enrolamiento de un solo uso, acuñado fuera de banda por un operador.
///
/// El secreto opaco viaja al operador exactamente una vez; aquí solo vive
/// su huella. Invariante: un token revocado, expirado o consumido jamás
/// acuña una credencial.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentToken {
    /// Huella SHA-256 hexadecimal del secreto presentado por el agente.
    pub token_digest: String,
    pub tenant_id: String,
    pub expires_at: DateTime<Utc>,
    pub single_use: bool,
    pub consumed_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EnrollmentToken {
    /// Veredicto de admisibilidad en el instante 'now'.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none()
            && self.consumed_at.is_none()
            && self.expires_at > now
    }
}
