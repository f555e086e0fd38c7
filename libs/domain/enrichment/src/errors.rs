// [libs/domain/enrichment/src/errors.rs]
/*!
 * =================================================================
 * APARATO: ENRICHMENT ERROR CATALOG (V3.1 - SOBERANO)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DEL MOTOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAXONOMY ALIGNMENT: Distingue fallos temporales (reintentables,
 *    preservan el trabajo) de fallos de contrato (no reintentables).
 * 2. STRATA PREFIXES: Mensajes con prefijos de estrato para el
 *    renderizado cromático en el Dashboard.
 * =================================================================
 */

use thiserror::Error;

/// Fallos del pipeline de enriquecimiento.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    /// Fallo del diccionario de componentes (consulta exacta o candidatos).
    #[error("[L2_DICTIONARY_FAULT]: COMPONENT_LOOKUP_COLLAPSED -> {0}")]
    Dictionary(String),

    /// Fallo del almacén local de conocimiento CVE.
    #[error("[L2_STORE_FAULT]: VULNERABILITY_STORE_UNREACHABLE -> {0}")]
    Store(String),

    /// Fallo de la jerarquía de caché compartida (L2).
    #[error("[L2_CACHE_FAULT]: SHARED_CACHE_DEGRADED -> {0}")]
    Cache(String),

    /// La ventana de ejecución del sub-lote se agotó antes de resolver.
    #[error("[L2_DEADLINE_FAULT]: SUB_BATCH_WINDOW_EXHAUSTED")]
    DeadlineExceeded,

    /// Fallo transitorio de infraestructura; el trabajo debe preservarse.
    #[error("[L2_TEMPORARY_FAULT]: {0}")]
    Temporary(String),
}

/// Fallos reportados por un cliente upstream de datos CVE.
/// El motor decide entre degradación 'stale-ok' y fallo temporal.
#[derive(Error, Debug)]
pub enum UpstreamFault {
    /// Fallo transitorio de red o de servidor (reintentable).
    #[error("[L3_UPSTREAM_FAULT]: SOURCE_TEMPORARY_COLLAPSE -> {0}")]
    Temporary(String),

    /// El breaker del cliente está abierto; no se emitió tráfico.
    #[error("[L3_UPSTREAM_FAULT]: CIRCUIT_OPEN")]
    CircuitOpen,

    /// El presupuesto global de tasa denegó la petición.
    #[error("[L3_UPSTREAM_FAULT]: RATE_BUDGET_DENIED (retry_after_ms={retry_after_ms})")]
    RateDenied { retry_after_ms: u64 },

    /// El payload upstream no pudo decodificarse al contrato CVE.
    #[error("[L3_UPSTREAM_FAULT]: ENVELOPE_CORRUPTION -> {0}")]
    Decoding(String),

    /// La ventana de la petición expiró antes de la respuesta.
    #[error("[L3_UPSTREAM_FAULT]: REQUEST_DEADLINE_EXHAUSTED")]
    DeadlineExceeded,
}

impl UpstreamFault {
    /// Un fallo que permite degradación a material en caché ('stale-ok').
    pub fn permits_stale_fallback(&self) -> bool {
        matches!(
            self,
            UpstreamFault::Temporary(_)
                | UpstreamFault::CircuitOpen
                | UpstreamFault::RateDenied { .. }
                | UpstreamFault::DeadlineExceeded
        )
    }
}
