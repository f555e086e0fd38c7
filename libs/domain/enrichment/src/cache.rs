// [libs/domain/enrichment/src/cache.rs]
/*!
 * =================================================================
 * APARATO: TIERED RESOLUTION CACHE (V3.4 - SINGLE-FLIGHT GUARD)
 * CLASIFICACIÓN: DOMAIN INFRASTRUCTURE (ESTRATO L2)
 * RESPONSABILIDAD: JERARQUÍA L1 (PROCESO) / L2 (COMPARTIDA) CON
 *                  SUPRESIÓN DE ESTAMPIDAS POR CLAVE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE KEY SCHEMA: Ambos niveles se indexan por la tupla
 *    canónica (normalized_name, version); un único esquema de clave
 *    colapsa las cachés ad-hoc históricas.
 * 2. THUNDERING HERD SHIELD: Los misses se serializan por clave y por
 *    proceso mediante candados single-flight, de modo que una ráfaga
 *    concurrente jamás multiplica la carga upstream.
 * 3. FRESHNESS != EQUALITY: La caché altera la frescura del material,
 *    nunca la igualdad del conjunto de hallazgos emitido.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::EnrichmentError;
use crate::metrics::EngineMetrics;
use crate::normalize::NormalizedTuple;
use crate::traits::SharedCache;

/// Clave única de la jerarquía: tupla canónica (nombre, versión).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub normalized_name: String,
    pub version: String,
}

impl CacheKey {
    pub fn from_tuple(tuple: &NormalizedTuple) -> Self {
        Self {
            normalized_name: tuple.name.clone(),
            version: tuple.version.clone(),
        }
    }

    /// Forma textual estable para el almacén clave-valor L2.
    pub fn storage_form(&self) -> String {
        format!("{}\u{1f}{}", self.normalized_name, self.version)
    }
}

/// Vulnerabilidad resuelta, lista para materializar un hallazgo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedVulnerability {
    pub component_canonical: String,
    pub cve_id: String,
    pub cvss_score: f64,
}

/// Veredicto cacheado para una tupla: conjunto resuelto o no-match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVerdict {
    pub resolved: Vec<ResolvedVulnerability>,
    /// La tupla no pudo identificarse contra el diccionario.
    pub unidentified: bool,
    pub resolved_at: DateTime<Utc>,
}

struct ProcessCacheEntry {
    verdict: CachedVerdict,
    stored_at_ms: i64,
    /// Sello monotónico de último acceso (inmune a empates de reloj).
    last_touched_tick: u64,
}

/// Caché L1 por proceso: acotada por cardinalidad, TTL corto, expulsión
/// del residente menos usado recientemente.
pub struct ProcessCache {
    entries: DashMap<CacheKey, ProcessCacheEntry>,
    capacity: usize,
    time_to_live: Duration,
    touch_sequencer: std::sync::atomic::AtomicU64,
}

impl ProcessCache {
    pub fn new(capacity: usize, time_to_live: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            time_to_live,
            touch_sequencer: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn fetch(&self, key: &CacheKey) -> Option<CachedVerdict> {
        let now_ms = Utc::now().timestamp_millis();

        let mut occupant = self.entries.get_mut(key)?;
        if now_ms - occupant.stored_at_ms > self.time_to_live.as_millis() as i64 {
            drop(occupant);
            self.entries.remove(key);
            return None;
        }

        occupant.last_touched_tick = self
            .touch_sequencer
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(occupant.verdict.clone())
    }

    pub fn store(&self, key: CacheKey, verdict: CachedVerdict) {
        let now_ms = Utc::now().timestamp_millis();
        let touch_tick = self
            .touch_sequencer
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        self.entries.insert(key, ProcessCacheEntry {
            verdict,
            stored_at_ms: now_ms,
            last_touched_tick: touch_tick,
        });

        // Expulsión del residente más frío una vez superada la capacidad.
        while self.entries.len() > self.capacity {
            let coldest_key = self
                .entries
                .iter()
                .min_by_key(|occupant| occupant.value().last_touched_tick)
                .map(|occupant| occupant.key().clone());

            match coldest_key {
                Some(victim) => {
                    self.entries.remove(&victim);
                }
                None => break,
            }
        }
    }

    pub fn occupancy(&self) -> usize {
        self.entries.len()
    }
}

/// Jerarquía completa: L1 -> L2 -> resolutor autoritativo.
/// Las escrituras pueblan ambos niveles; los misses son single-flighted.
pub struct TieredCache {
    process_cache: ProcessCache,
    shared_cache: Arc<dyn SharedCache>,
    shared_time_to_live: Duration,
    flight_latches: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl TieredCache {
    pub fn new(
        process_cache: ProcessCache,
        shared_cache: Arc<dyn SharedCache>,
        shared_time_to_live: Duration,
    ) -> Self {
        Self {
            process_cache,
            shared_cache,
            shared_time_to_live,
            flight_latches: DashMap::new(),
        }
    }

    /// Candado single-flight para la clave; el poseedor resuelve, el resto espera.
    pub fn flight_latch(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.flight_latches
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Libera el candado de vuelo una vez poblada la jerarquía.
    pub fn release_latch(&self, key: &CacheKey) {
        self.flight_latches.remove(key);
    }

    /// Ruta de lectura L1 -> L2. Un acierto L2 repuebla L1.
    pub async fn fetch(
        &self,
        key: &CacheKey,
        metrics: &EngineMetrics,
    ) -> Result<Option<CachedVerdict>, EnrichmentError> {
        if let Some(verdict) = self.process_cache.fetch(key) {
            metrics.record_l1_hit();
            return Ok(Some(verdict));
        }

        match self.shared_cache.fetch(key).await? {
            Some(verdict) => {
                metrics.record_l2_hit();
                self.process_cache.store(key.clone(), verdict.clone());
                Ok(Some(verdict))
            }
            None => Ok(None),
        }
    }

    /// Escritura dual L1 + L2.
    pub async fn store(&self, key: &CacheKey, verdict: &CachedVerdict) -> Result<(), EnrichmentError> {
        self.process_cache.store(key.clone(), verdict.clone());

        if let Err(shared_fault) = self
            .shared_cache
            .store(key, verdict, self.shared_time_to_live)
            .await
        {
            // La degradación de L2 no invalida el veredicto ya resuelto.
            debug!("⚠️ [CACHE_L2_DEGRADED]: {}", shared_fault);
        }

        Ok(())
    }
}
