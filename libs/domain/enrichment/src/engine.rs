// [libs/domain/enrichment/src/engine.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ENRICHMENT ENGINE (V3.6 - SINGULARITY GOLD)
 * CLASIFICACIÓN: DOMAIN ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: TUPLAS OBSERVADAS -> CONJUNTO DETERMINISTA DE HALLAZGOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PIPELINE COLLAPSE: Un único motor reemplaza toda fragmentación
 *    histórica (basic/batch/ultra); el paralelismo es asunto del pool.
 * 2. SOURCE LADDER: caché L1 -> caché L2 -> almacén local -> upstreams;
 *    las fuentes de menor latencia son autoritativas dentro del TTL
 *    de frescura configurado.
 * 3. STALE-OK DEGRADATION: Ante colapso upstream el motor degrada a
 *    material local conocido; solo falla cuando no existe evidencia.
 *
 * # Mathematical Proof (Output Determinism):
 * Para instantáneas fijas de diccionario y almacén CVE, el conjunto
 * emitido F(scan) es función pura de las tuplas de entrada: la caché
 * altera latencia y frescura, jamás la igualdad de F. El orden de
 * emisión se sella con (dependency_name, cve_id) ascendente.
 * =================================================================
 */

use chrono::Utc;
use sentinel_domain_models::cve::ComponentIdentifier;
use sentinel_domain_models::finding::{Finding, FindingPriority};
use sentinel_domain_models::scan::DependencyRecord;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, CachedVerdict, ResolvedVulnerability, TieredCache};
use crate::errors::EnrichmentError;
use crate::fingerprint::{FingerprintResolver, FingerprintVerdict};
use crate::metrics::EngineMetrics;
use crate::normalize::{normalize_dependency, NormalizedTuple};
use crate::traits::{ComponentDictionary, UpstreamSource, VulnerabilityStore};

/// Parámetros de sintonía del motor (inyectados desde el entorno C2).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Máximo de candidatos K del generador de texto completo.
    pub candidate_limit: usize,
    /// Umbral de similitud τ para aceptar un candidato.
    pub similarity_threshold: f64,
    /// Ventana de frescura del conocimiento local frente a upstreams.
    pub freshness_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 10,
            similarity_threshold: 0.55,
            freshness_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// Fallo puntual de una dependencia dentro de un sub-lote.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub dependency: DependencyRecord,
    pub error: String,
}

/// Resultado de enriquecer un sub-lote completo.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub findings: Vec<Finding>,
    /// Tuplas sin identificador oficial (registradas solo en métricas).
    pub unidentified: Vec<DependencyRecord>,
    /// Dependencias cuya resolución colapsó; forman el residuo del job.
    pub failures: Vec<BatchFailure>,
}

/// El motor soberano de enriquecimiento CVE.
pub struct EnrichmentEngine {
    fingerprint_resolver: FingerprintResolver<dyn ComponentDictionary>,
    vulnerability_store: Arc<dyn VulnerabilityStore>,
    upstream_sources: Vec<Arc<dyn UpstreamSource>>,
    tiered_cache: TieredCache,
    metrics: Arc<EngineMetrics>,
    config: EngineConfig,
}

impl EnrichmentEngine {
    pub fn new(
        dictionary: Arc<dyn ComponentDictionary>,
        vulnerability_store: Arc<dyn VulnerabilityStore>,
        upstream_sources: Vec<Arc<dyn UpstreamSource>>,
        tiered_cache: TieredCache,
        metrics: Arc<EngineMetrics>,
        config: EngineConfig,
    ) -> Self {
        Self {
            fingerprint_resolver: FingerprintResolver::new(
                dictionary,
                config.candidate_limit,
                config.similarity_threshold,
            ),
            vulnerability_store,
            upstream_sources,
            tiered_cache,
            metrics,
            config,
        }
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /**
     * Enriquece un sub-lote de dependencias dentro de la ventana dada.
     *
     * Las dependencias duplicadas colapsan a una única tupla canónica,
     * de modo que un mismo CVE jamás produce hallazgos duplicados.
     *
     * # Errors:
     * Los fallos son por dependencia, jamás globales: la porción
     * resuelta del sub-lote siempre se reporta en 'findings'.
     */
    #[instrument(skip(self, dependencies), fields(scan = %scan_id, batch_size = dependencies.len()))]
    pub async fn enrich_batch(
        &self,
        tenant_id: &str,
        agent_id: &str,
        scan_id: &str,
        dependencies: &[DependencyRecord],
        window: Duration,
    ) -> BatchOutcome {
        let batch_deadline = Instant::now() + window;
        let mut outcome = BatchOutcome::default();

        // --- FASE 1: COLAPSO DE DUPLICADOS A TUPLAS CANÓNICAS ---
        let mut seen_keys: HashSet<CacheKey> = HashSet::new();
        let mut unique_workload: Vec<(CacheKey, NormalizedTuple, DependencyRecord)> = Vec::new();

        for dependency in dependencies {
            let tuple = normalize_dependency(dependency);
            let key = CacheKey::from_tuple(&tuple);

            if seen_keys.insert(key.clone()) {
                unique_workload.push((key, tuple, dependency.clone()));
            }
        }

        // --- FASE 2: RESOLUCIÓN POR TUPLA BAJO LA VENTANA DEL SUB-LOTE ---
        for (key, tuple, dependency) in unique_workload {
            if Instant::now() >= batch_deadline {
                outcome.failures.push(BatchFailure {
                    dependency,
                    error: EnrichmentError::DeadlineExceeded.to_string(),
                });
                continue;
            }

            match self.resolve_tuple(&key, &tuple, batch_deadline).await {
                Ok(verdict) if verdict.unidentified => {
                    self.metrics.record_unidentified();
                    debug!("🕳️  [ENGINE]: Tuple [{} {}] carried as no-match.", tuple.name, tuple.version);
                    outcome.unidentified.push(dependency);
                }
                Ok(verdict) => {
                    self.materialize_findings(
                        tenant_id,
                        agent_id,
                        scan_id,
                        &tuple,
                        &verdict,
                        &mut outcome.findings,
                    );
                }
                Err(resolution_fault) => {
                    outcome.failures.push(BatchFailure {
                        dependency,
                        error: resolution_fault.to_string(),
                    });
                }
            }
        }

        // --- FASE 3: SELLADO DETERMINISTA DEL ORDEN DE EMISIÓN ---
        outcome
            .findings
            .sort_by(|left, right| {
                left.dependency_name
                    .cmp(&right.dependency_name)
                    .then_with(|| left.cve_id.cmp(&right.cve_id))
            });

        outcome
    }

    /// Ruta de resolución por tupla: caché -> autoritativo, con
    /// single-flight por clave y por proceso.
    async fn resolve_tuple(
        &self,
        key: &CacheKey,
        tuple: &NormalizedTuple,
        batch_deadline: Instant,
    ) -> Result<CachedVerdict, EnrichmentError> {
        if let Some(cached) = self.tiered_cache.fetch(key, &self.metrics).await? {
            return Ok(cached);
        }

        // Supresión de estampida: un único vuelo por clave y proceso.
        let flight_latch = self.tiered_cache.flight_latch(key);
        let _flight_guard = flight_latch.lock().await;

        // Re-verificación post-candado: otro vuelo pudo haber poblado ya.
        if let Some(cached) = self.tiered_cache.fetch(key, &self.metrics).await? {
            self.tiered_cache.release_latch(key);
            return Ok(cached);
        }

        let resolution = self.resolve_authoritative(tuple, batch_deadline).await;

        match resolution {
            Ok(verdict) => {
                self.tiered_cache.store(key, &verdict).await?;
                self.tiered_cache.release_latch(key);
                Ok(verdict)
            }
            Err(resolution_fault) => {
                self.tiered_cache.release_latch(key);
                Err(resolution_fault)
            }
        }
    }

    /// Resolución autoritativa: huella + escalera de fuentes CVE.
    async fn resolve_authoritative(
        &self,
        tuple: &NormalizedTuple,
        batch_deadline: Instant,
    ) -> Result<CachedVerdict, EnrichmentError> {
        let fingerprint_verdict = self.fingerprint_resolver.resolve(tuple).await?;

        let components = match fingerprint_verdict {
            FingerprintVerdict::Unidentified => {
                return Ok(CachedVerdict {
                    resolved: Vec::new(),
                    unidentified: true,
                    resolved_at: Utc::now(),
                });
            }
            FingerprintVerdict::Matched(components) => components,
        };

        // Fusión por cve_id preservando la puntuación del registro más reciente.
        let mut merged: HashMap<String, ResolvedVulnerability> = HashMap::new();

        for component in &components {
            let records = self.resolve_component(component, batch_deadline).await?;

            for record in records {
                merged
                    .entry(record.cve_id.clone())
                    .or_insert_with(|| ResolvedVulnerability {
                        component_canonical: component.canonical_form(),
                        cve_id: record.cve_id.clone(),
                        cvss_score: record.cvss_score,
                    });
            }
        }

        let mut resolved: Vec<ResolvedVulnerability> = merged.into_values().collect();
        resolved.sort_by(|left, right| left.cve_id.cmp(&right.cve_id));

        Ok(CachedVerdict {
            resolved,
            unidentified: false,
            resolved_at: Utc::now(),
        })
    }

    /// Escalera de fuentes para un componente: almacén fresco -> upstream
    /// (persistiendo de vuelta) -> degradación 'stale-ok'.
    async fn resolve_component(
        &self,
        component: &ComponentIdentifier,
        batch_deadline: Instant,
    ) -> Result<Vec<sentinel_domain_models::cve::CveRecord>, EnrichmentError> {
        let now = Utc::now();
        let refreshed_at = self
            .vulnerability_store
            .component_refreshed_at(component)
            .await?;

        let freshness_window = chrono::Duration::from_std(self.config.freshness_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(24));

        let is_fresh = refreshed_at
            .map(|stamp| now - stamp < freshness_window)
            .unwrap_or(false);

        if is_fresh || self.upstream_sources.is_empty() {
            self.metrics.record_store_resolution();
            return self.vulnerability_store.cves_for_component(component).await;
        }

        // --- SINCRONIZACIÓN UPSTREAM (fuera de frescura) ---
        let mut last_upstream_fault = None;

        for source in &self.upstream_sources {
            let remaining_window = batch_deadline.saturating_duration_since(Instant::now());
            if remaining_window.is_zero() {
                return Err(EnrichmentError::DeadlineExceeded);
            }

            self.metrics.record_upstream_fetch();

            match source.fetch_cves(component, remaining_window).await {
                Ok(upstream_records) => {
                    // El material upstream cristaliza en el almacén local;
                    // la lectura de vuelta aplica la política modified-at.
                    self.vulnerability_store
                        .persist_cve_records(&upstream_records)
                        .await?;
                    self.vulnerability_store
                        .mark_component_refreshed(component, now)
                        .await?;

                    return self.vulnerability_store.cves_for_component(component).await;
                }
                Err(upstream_fault) => {
                    self.metrics.record_upstream_fault();
                    warn!(
                        "⚡ [UPSTREAM_DEGRADED]: Source [{}] failed for [{}]: {}",
                        source.source_name(),
                        component.canonical_form(),
                        upstream_fault
                    );
                    last_upstream_fault = Some(upstream_fault);
                }
            }
        }

        // --- DEGRADACIÓN 'STALE-OK' ---
        if let Some(fault) = last_upstream_fault {
            if fault.permits_stale_fallback() {
                let stale_records = self.vulnerability_store.cves_for_component(component).await?;

                if !stale_records.is_empty() || refreshed_at.is_some() {
                    warn!(
                        "🧊 [STALE_OK]: Serving local knowledge for [{}] while upstream recovers.",
                        component.canonical_form()
                    );
                    self.metrics.record_store_resolution();
                    return Ok(stale_records);
                }
            }

            return Err(EnrichmentError::Temporary(fault.to_string()));
        }

        self.metrics.record_store_resolution();
        self.vulnerability_store.cves_for_component(component).await
    }

    /// Emite un hallazgo por par (tupla, cve) con prioridad derivada.
    fn materialize_findings(
        &self,
        tenant_id: &str,
        agent_id: &str,
        scan_id: &str,
        tuple: &NormalizedTuple,
        verdict: &CachedVerdict,
        sink: &mut Vec<Finding>,
    ) {
        for resolved in &verdict.resolved {
            sink.push(Finding {
                finding_id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                agent_id: agent_id.to_string(),
                scan_id: scan_id.to_string(),
                dependency_name: tuple.name.clone(),
                dependency_version: tuple.version.clone(),
                component_identifier: resolved.component_canonical.clone(),
                cve_id: resolved.cve_id.clone(),
                priority: FindingPriority::from_cvss_score(resolved.cvss_score),
                detected_at: Utc::now().to_rfc3339(),
            });
        }
    }
}
