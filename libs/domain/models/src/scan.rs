// [libs/domain/models/src/scan.rs]
/*!
 * =================================================================
 * APARATO: SCAN DOMAIN MODELS (V3.4 - IMMUTABLE EVIDENCE)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DEL REPORTE ATÓMICO DE DEPENDENCIAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONTENT SEALING: El digest canónico de dependencias sella la
 *    idempotencia por (tenant, scan_id): mismo digest -> aceptación
 *    idempotente; digest distinto -> conflicto.
 * 2. IMMUTABILITY: Un scan aceptado jamás muta; solo su estado de
 *    enriquecimiento transiciona.
 * 3. STATUS VISIBILITY: Un scan sin hallazgos es distinguible de un
 *    scan aún pendiente de enriquecimiento vía 'enrichment_status'.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::digest::sha256_hexadecimal_digest;

/// Una dependencia descubierta por el escáner local del agente.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyRecord {
    pub name: String,
    pub version: Option<String>,
    pub dependency_type: String,
    pub vendor: Option<String>,
    pub location: Option<String>,
}

/// Ciclo de vida del enriquecimiento de un scan, visible al Dashboard.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentStatus {
    /// Aceptado y encolado; sin veredicto CVE todavía.
    Pending,
    /// La cola rechazó el encolado; el reconciliador lo re-encolará.
    AwaitingEnrichment,
    /// Enriquecimiento completo (cero hallazgos es un veredicto válido).
    Enriched,
    /// Parte de los sub-lotes persistió; el residuo agotó reintentos.
    Partial,
    /// Ningún sub-lote pudo resolverse antes de agotar reintentos.
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::AwaitingEnrichment => "awaiting-enrichment",
            EnrichmentStatus::Enriched => "enriched",
            EnrichmentStatus::Partial => "partial",
            EnrichmentStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(EnrichmentStatus::Pending),
            "awaiting-enrichment" => Some(EnrichmentStatus::AwaitingEnrichment),
            "enriched" => Some(EnrichmentStatus::Enriched),
            "partial" => Some(EnrichmentStatus::Partial),
            "failed" => Some(EnrichmentStatus::Failed),
            _ => None,
        }
    }
}

/// Payload de entrada del canal de reporte (`POST /agents/results`).
/// El campo de tenant NO existe aquí: la credencial es la autoridad.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSubmission {
    pub scan_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub scan_status: String,
    pub dependencies: Vec<DependencyRecord>,
}

impl ScanSubmission {
    /// Digest canónico del contenido de dependencias.
    ///
    /// La canonicalización ordena las tuplas para que el sellado sea
    /// insensible al orden de descubrimiento del escáner local.
    pub fn dependency_content_digest(&self) -> String {
        let mut canonical_lines: Vec<String> = self
            .dependencies
            .iter()
            .map(|dependency| {
                format!(
                    "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
                    dependency.name,
                    dependency.version.as_deref().unwrap_or(""),
                    dependency.dependency_type,
                    dependency.vendor.as_deref().unwrap_or(""),
                    dependency.location.as_deref().unwrap_or("")
                )
            })
            .collect();
        canonical_lines.sort();

        sha256_hexadecimal_digest(canonical_lines.join("\n").as_bytes())
    }
}

/// Registro persistido de un scan aceptado (inmutable salvo estado).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResultRecord {
    pub scan_id: String,
    pub agent_id: String,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub enrichment_status: EnrichmentStatus,
    pub dependency_digest: String,
    pub dependency_count: u32,
    pub accepted_at: DateTime<Utc>,
}
