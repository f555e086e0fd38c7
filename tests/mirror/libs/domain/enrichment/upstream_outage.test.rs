// [tests/mirror/libs/domain/enrichment/upstream_outage.test.rs]
/**
 * =================================================================
 * APARATO: UPSTREAM OUTAGE CERTIFICATION (V3.2 - STALE-OK)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-ENGINE)
 * RESPONSABILIDAD: DEGRADACIÓN ANTE COLAPSO TOTAL DEL UPSTREAM
 *
 * # Logic:
 * Con el upstream caído:
 * - Componentes con conocimiento local -> veredicto 'stale-ok'.
 * - Componentes sin evidencia alguna -> fallo 'temporary' que forma
 *   el residuo del sub-lote (rumbo al dead-letter).
 * =================================================================
 */

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sentinel_domain_enrichment::cache::{CacheKey, CachedVerdict, ProcessCache, TieredCache};
use sentinel_domain_enrichment::engine::{EngineConfig, EnrichmentEngine};
use sentinel_domain_enrichment::errors::{EnrichmentError, UpstreamFault};
use sentinel_domain_enrichment::metrics::EngineMetrics;
use sentinel_domain_enrichment::normalize::NormalizedTuple;
use sentinel_domain_enrichment::traits::{
    ComponentDictionary, SharedCache, UpstreamSource, VulnerabilityStore,
};
use sentinel_domain_models::cve::{ComponentIdentifier, CveRecord};
use sentinel_domain_models::scan::DependencyRecord;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct StubDictionary;

#[async_trait]
impl ComponentDictionary for StubDictionary {
    async fn exact_lookup(
        &self,
        tuple: &NormalizedTuple,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError> {
        match tuple.name.as_str() {
            "nginx" => Ok(vec![ComponentIdentifier::new("f5", "nginx", &tuple.version)]),
            "ghost-package" => Ok(vec![ComponentIdentifier::new("ghost", "ghost-package", &tuple.version)]),
            _ => Ok(Vec::new()),
        }
    }

    async fn candidate_lookup(
        &self,
        _hint: &str,
        _limit: usize,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError> {
        Ok(Vec::new())
    }
}

/// Almacén con conocimiento RANCIO para nginx y vacío para ghost.
struct StaleStore {
    refresh_registry: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl StaleStore {
    fn new() -> Self {
        let mut seeded = HashMap::new();
        // nginx fue sincronizado hace 10 días: fuera de la ventana de frescura.
        seeded.insert("f5:nginx:1.21.0".to_string(), Utc::now() - ChronoDuration::days(10));

        Self { refresh_registry: Mutex::new(seeded) }
    }
}

#[async_trait]
impl VulnerabilityStore for StaleStore {
    async fn cves_for_component(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Vec<CveRecord>, EnrichmentError> {
        if component.canonical_form() == "f5:nginx:1.21.0" {
            Ok(vec![CveRecord {
                cve_id: "CVE-2021-23017".to_string(),
                description: "Stale but authoritative evidence.".to_string(),
                severity: "HIGH".to_string(),
                cvss_score: 7.7,
                published_at: Utc::now() - ChronoDuration::days(400),
                modified_at: Utc::now() - ChronoDuration::days(30),
                affected_components: vec!["f5:nginx:1.21.0".to_string()],
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn persist_cve_records(&self, _records: &[CveRecord]) -> Result<(), EnrichmentError> {
        Ok(())
    }

    async fn component_refreshed_at(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Option<DateTime<Utc>>, EnrichmentError> {
        Ok(self
            .refresh_registry
            .lock()
            .expect("LOCK")
            .get(&component.canonical_form())
            .copied())
    }

    async fn mark_component_refreshed(
        &self,
        component: &ComponentIdentifier,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), EnrichmentError> {
        self.refresh_registry
            .lock()
            .expect("LOCK")
            .insert(component.canonical_form(), refreshed_at);
        Ok(())
    }
}

#[derive(Default)]
struct StubSharedCache {
    entries: Mutex<HashMap<String, CachedVerdict>>,
}

#[async_trait]
impl SharedCache for StubSharedCache {
    async fn fetch(&self, key: &CacheKey) -> Result<Option<CachedVerdict>, EnrichmentError> {
        Ok(self.entries.lock().expect("LOCK").get(&key.storage_form()).cloned())
    }

    async fn store(
        &self,
        key: &CacheKey,
        verdict: &CachedVerdict,
        _ttl: Duration,
    ) -> Result<(), EnrichmentError> {
        self.entries
            .lock()
            .expect("LOCK")
            .insert(key.storage_form(), verdict.clone());
        Ok(())
    }
}

/// Fuente upstream en colapso total.
struct CollapsedUpstream {
    fetch_count: Arc<AtomicU64>,
}

#[async_trait]
impl UpstreamSource for CollapsedUpstream {
    fn source_name(&self) -> &str {
        "collapsed-source"
    }

    async fn fetch_cves(
        &self,
        _component: &ComponentIdentifier,
        _window: Duration,
    ) -> Result<Vec<CveRecord>, UpstreamFault> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        Err(UpstreamFault::Temporary("HTTP_503".to_string()))
    }
}

fn dependency(name: &str) -> DependencyRecord {
    DependencyRecord {
        name: name.to_string(),
        version: Some("1.21.0".to_string()),
        dependency_type: "package".to_string(),
        vendor: None,
        location: None,
    }
}

/**
 * CERTIFICACIÓN: Con el upstream caído, el conocimiento local rancio
 * sirve ('stale-ok') y la evidencia inexistente forma el residuo.
 */
#[tokio::test]
async fn certify_stale_ok_and_residual_split() {
    let fetch_count = Arc::new(AtomicU64::new(0));

    let engine = EnrichmentEngine::new(
        Arc::new(StubDictionary),
        Arc::new(StaleStore::new()),
        vec![Arc::new(CollapsedUpstream { fetch_count: Arc::clone(&fetch_count) }) as Arc<dyn UpstreamSource>],
        TieredCache::new(
            ProcessCache::new(64, Duration::from_secs(60)),
            Arc::new(StubSharedCache::default()) as Arc<dyn SharedCache>,
            Duration::from_secs(60),
        ),
        Arc::new(EngineMetrics::default()),
        EngineConfig::default(),
    );

    let batch = vec![dependency("nginx"), dependency("ghost-package")];
    let outcome = engine
        .enrich_batch("tenant-alpha", "agent-1", "scan-outage", &batch, Duration::from_secs(10))
        .await;

    // Veredicto A: nginx degradó a material local rancio.
    assert_eq!(outcome.findings.len(), 1, "STALE_OK_BREACH: local evidence not served.");
    assert_eq!(outcome.findings[0].cve_id, "CVE-2021-23017");

    // Veredicto B: ghost-package sin evidencia -> residuo temporal.
    assert_eq!(outcome.failures.len(), 1, "RESIDUAL_BREACH: unresolved tuple vanished.");
    assert_eq!(outcome.failures[0].dependency.name, "ghost-package");
    assert!(
        outcome.failures[0].error.contains("TEMPORARY"),
        "TAXONOMY_BREACH: residual cause must be temporary, got: {}",
        outcome.failures[0].error
    );

    // Veredicto C: el upstream fue consultado para ambos componentes.
    assert!(fetch_count.load(Ordering::Relaxed) >= 2);
}

/**
 * CERTIFICACIÓN: El veredicto 'stale-ok' puebla la caché; una segunda
 * pasada no vuelve a castigar al upstream caído.
 */
#[tokio::test]
async fn certify_cached_stale_verdict_shields_upstream() {
    let fetch_count = Arc::new(AtomicU64::new(0));

    let engine = EnrichmentEngine::new(
        Arc::new(StubDictionary),
        Arc::new(StaleStore::new()),
        vec![Arc::new(CollapsedUpstream { fetch_count: Arc::clone(&fetch_count) }) as Arc<dyn UpstreamSource>],
        TieredCache::new(
            ProcessCache::new(64, Duration::from_secs(60)),
            Arc::new(StubSharedCache::default()) as Arc<dyn SharedCache>,
            Duration::from_secs(60),
        ),
        Arc::new(EngineMetrics::default()),
        EngineConfig::default(),
    );

    let batch = vec![dependency("nginx")];

    let first = engine
        .enrich_batch("tenant-alpha", "agent-1", "scan-a", &batch, Duration::from_secs(10))
        .await;
    assert_eq!(first.findings.len(), 1);

    let probes_after_first = fetch_count.load(Ordering::Relaxed);

    let second = engine
        .enrich_batch("tenant-alpha", "agent-1", "scan-b", &batch, Duration::from_secs(10))
        .await;
    assert_eq!(second.findings.len(), 1);

    assert_eq!(
        fetch_count.load(Ordering::Relaxed),
        probes_after_first,
        "HERD_BREACH: cached verdict still hammered the collapsed upstream."
    );
}
