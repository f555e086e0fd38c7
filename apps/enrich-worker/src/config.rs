// [apps/enrich-worker/src/config.rs]
/*!
 * =================================================================
 * APARATO: WORKER CONFIG REGISTER (V3.2 - ENVIRONMENT AUTHORITY)
 * CLASIFICACIÓN: APPLICATION CONFIG (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: CAPTURA TIPADA DEL ENTORNO C2 DEL TRABAJADOR
 * =================================================================
 */

fn environment_number<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

/// Configuración reconocida por el pool de enriquecimiento.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    // --- POOL Y SUB-LOTEO ---
    pub worker_pool_size: usize,
    pub batch_size: usize,
    pub sub_batch_deadline_seconds: u64,

    // --- COLA TÁCTICA ---
    pub queue_lease_seconds: i64,
    pub max_queue_attempts: u32,
    pub poll_interval_ms: u64,

    // --- JERARQUÍA DE CACHÉ ---
    pub l1_capacity: usize,
    pub cache_l1_ttl_seconds: u64,
    pub cache_l2_ttl_seconds: u64,
    pub cve_freshness_ttl_seconds: u64,

    // --- RESOLUCIÓN DE HUELLAS ---
    pub candidate_limit: usize,
    pub similarity_threshold: f64,

    // --- FUENTE UPSTREAM CVE ---
    pub upstream_cve_endpoint: Option<String>,
    pub upstream_cve_api_key: Option<String>,
    pub upstream_rate_per_second: f64,
    pub upstream_burst: f64,
}

impl WorkerConfig {
    pub fn from_environment() -> Self {
        Self {
            worker_pool_size: environment_number("WORKER_POOL_SIZE", num_cpus::get()),
            batch_size: environment_number("ENRICHMENT_BATCH_SIZE", 250),
            sub_batch_deadline_seconds: environment_number("SUB_BATCH_DEADLINE_SECONDS", 30),
            queue_lease_seconds: environment_number("QUEUE_LEASE_SECONDS", 600),
            max_queue_attempts: environment_number("MAX_QUEUE_ATTEMPTS", 5),
            poll_interval_ms: environment_number("QUEUE_POLL_INTERVAL_MS", 1000),
            l1_capacity: environment_number("CACHE_L1_CAPACITY", 4096),
            cache_l1_ttl_seconds: environment_number("CACHE_L1_TTL_SECONDS", 300),
            cache_l2_ttl_seconds: environment_number("CACHE_L2_TTL_SECONDS", 3600),
            cve_freshness_ttl_seconds: environment_number("CVE_FRESHNESS_TTL_SECONDS", 24 * 3600),
            candidate_limit: environment_number("FINGERPRINT_CANDIDATE_LIMIT", 10),
            similarity_threshold: environment_number("FINGERPRINT_SIMILARITY_THRESHOLD", 0.55),
            upstream_cve_endpoint: std::env::var("UPSTREAM_CVE_ENDPOINT").ok(),
            upstream_cve_api_key: std::env::var("UPSTREAM_CVE_API_KEY").ok(),
            upstream_rate_per_second: environment_number("UPSTREAM_CVE_RATE_PER_SECOND", 0.5),
            upstream_burst: environment_number("UPSTREAM_CVE_BURST", 5.0),
        }
    }
}
