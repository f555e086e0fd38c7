// [libs/domain/enrichment/src/metrics.rs]
//! =================================================================
//! APARATO: ENGINE METRICS REGISTER (V3.0)
//! CLASIFICACIÓN: DOMAIN OBSERVABILITY (ESTRATO L2)
//! RESPONSABILIDAD: CONTADORES ATÓMICOS DEL PIPELINE DE ENRIQUECIMIENTO
//! =================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Contadores atómicos del motor. Las tuplas no identificadas se registran
/// aquí (y en el rastro), jamás como hallazgos.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    unidentified_total: AtomicU64,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    store_resolutions: AtomicU64,
    upstream_fetches: AtomicU64,
    upstream_faults: AtomicU64,
}

/// Instantánea serializable para el diagnóstico del operador.
#[derive(Debug, Clone, Serialize)]
pub struct EngineMetricsSnapshot {
    pub unidentified_total: u64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub store_resolutions: u64,
    pub upstream_fetches: u64,
    pub upstream_faults: u64,
}

impl EngineMetrics {
    pub fn record_unidentified(&self) {
        self.unidentified_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l1_hit(&self) {
        self.l1_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l2_hit(&self) {
        self.l2_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_resolution(&self) {
        self.store_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_fetch(&self) {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_fault(&self) {
        self.upstream_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            unidentified_total: self.unidentified_total.load(Ordering::Relaxed),
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            store_resolutions: self.store_resolutions.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            upstream_faults: self.upstream_faults.load(Ordering::Relaxed),
        }
    }
}
