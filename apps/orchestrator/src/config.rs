// [apps/orchestrator/src/config.rs]
/*!
 * =================================================================
 * APARATO: INGESTION CONFIG REGISTER (V3.2 - ENVIRONMENT AUTHORITY)
 * CLASIFICACIÓN: APPLICATION CONFIG (ESTRATO L1-APP)
 * RESPONSABILIDAD: CAPTURA TIPADA DEL ENTORNO C2 RECONOCIDO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CLOSED SURFACE: Solo las variables aquí listadas son reconocidas
 *    por el núcleo; cualquier otra pertenece a UI/analítica.
 * 2. SANE DEFAULTS: Cada parámetro porta un valor nominal apto para
 *    despliegues locales sin fricción.
 * =================================================================
 */

/// Lee una variable de entorno numérica con valor nominal de respaldo.
fn environment_number<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

/// Configuración reconocida por el estrato de ingesta.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Token maestro del operador para la superficie /admin.
    /// Vacío => superficie de gobernanza deshabilitada.
    pub operator_api_token: String,

    // --- CICLO DE VIDA DE SECRETOS ---
    pub enrollment_token_ttl_seconds: i64,
    pub credential_ttl_seconds: i64,
    pub credential_rotation_overlap_seconds: i64,

    // --- GOBERNANZA DE TASA DE INGESTA (por credencial y por tenant) ---
    pub ingest_rate_per_second: f64,
    pub ingest_burst: f64,

    // --- LÍMITES DE VALIDACIÓN ---
    pub max_dependencies_per_scan: usize,
    pub max_payload_bytes: u64,

    // --- LIVENESS DE AGENTES ---
    pub heartbeat_silence_seconds: i64,
}

impl IngestConfig {
    /// Captura el entorno C2 una única vez durante la ignición.
    pub fn from_environment() -> Self {
        Self {
            operator_api_token: std::env::var("OPERATOR_API_TOKEN").unwrap_or_default(),
            enrollment_token_ttl_seconds: environment_number("ENROLLMENT_TOKEN_TTL_SECONDS", 900),
            credential_ttl_seconds: environment_number("CREDENTIAL_TTL_SECONDS", 30 * 24 * 3600),
            credential_rotation_overlap_seconds: environment_number(
                "CREDENTIAL_ROTATION_OVERLAP_SECONDS",
                3600,
            ),
            ingest_rate_per_second: environment_number("INGEST_RATE_PER_SECOND", 20.0),
            ingest_burst: environment_number("INGEST_BURST", 40.0),
            max_dependencies_per_scan: environment_number("MAX_DEPENDENCIES_PER_SCAN", 2000),
            max_payload_bytes: environment_number("MAX_PAYLOAD_BYTES", 5 * 1024 * 1024),
            heartbeat_silence_seconds: environment_number("HEARTBEAT_SILENCE_SECONDS", 300),
        }
    }
}
