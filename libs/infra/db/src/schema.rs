// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: SOVEREIGN DATABASE SCHEMA (V3.5 - PIPELINE STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. TENANT PARTITIONING: Las tablas de agentes, scans y hallazgos se
 *    indexan por tenant; el conocimiento CVE es global y compartido.
 * 2. DURABLE QUEUE: La cola de enriquecimiento y su dead-letter viven
 *    en el mismo Ledger, sobreviviendo a reinicios de proceso.
 * 3. IDEMPOTENCIA: 'CREATE ... IF NOT EXISTS' permite migraciones en
 *    caliente sobre instancias ya desplegadas.
 * 4. PERFORMANCE: Índices de aceleración para el despacho masivo y
 *    las agregaciones de severidad del Dashboard.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::info;

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del pipeline de inteligencia de vulnerabilidades.
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_TENANTS", r#"
        CREATE TABLE IF NOT EXISTS tenants (
            tenant_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_ENROLLMENT_TOKENS", r#"
        CREATE TABLE IF NOT EXISTS enrollment_tokens (
            token_digest TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            single_use INTEGER NOT NULL DEFAULT 1,
            consumed_at TEXT,
            revoked_at TEXT,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            agent_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            hostname TEXT NOT NULL,
            operating_system TEXT NOT NULL,
            architecture TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'online'
        );
    "#),
    ("TABLE_AGENT_CREDENTIALS", r#"
        CREATE TABLE IF NOT EXISTS agent_credentials (
            credential_id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            secret_digest TEXT NOT NULL UNIQUE,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            revoked_at TEXT
        );
    "#),
    ("TABLE_SYSTEM_INFO", r#"
        CREATE TABLE IF NOT EXISTS system_info (
            agent_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            snapshot_json TEXT NOT NULL,
            captured_at TEXT NOT NULL
        );
    "#),
    ("TABLE_SCANS", r#"
        CREATE TABLE IF NOT EXISTS scans (
            tenant_id TEXT NOT NULL,
            scan_id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            enrichment_status TEXT NOT NULL DEFAULT 'pending',
            dependency_digest TEXT NOT NULL,
            dependency_count INTEGER NOT NULL DEFAULT 0,
            accepted_at TEXT NOT NULL,
            last_error TEXT,
            PRIMARY KEY (tenant_id, scan_id)
        );
    "#),
    ("TABLE_SCAN_DEPENDENCIES", r#"
        CREATE TABLE IF NOT EXISTS scan_dependencies (
            tenant_id TEXT NOT NULL,
            scan_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            name TEXT NOT NULL,
            version TEXT,
            dependency_type TEXT NOT NULL,
            vendor TEXT,
            location TEXT,
            PRIMARY KEY (tenant_id, scan_id, ordinal)
        );
    "#),
    ("TABLE_FINDINGS", r#"
        CREATE TABLE IF NOT EXISTS findings (
            finding_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            scan_id TEXT NOT NULL,
            dependency_name TEXT NOT NULL,
            dependency_version TEXT NOT NULL,
            component_identifier TEXT NOT NULL,
            cve_id TEXT NOT NULL,
            priority TEXT NOT NULL,
            detected_at TEXT NOT NULL
        );
    "#),
    ("TABLE_CVE_RECORDS", r#"
        CREATE TABLE IF NOT EXISTS cve_records (
            cve_id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            severity TEXT NOT NULL,
            cvss_score REAL NOT NULL,
            published_at TEXT NOT NULL,
            modified_at TEXT NOT NULL
        );
    "#),
    ("TABLE_CVE_AFFECTED_COMPONENTS", r#"
        CREATE TABLE IF NOT EXISTS cve_affected_components (
            cve_id TEXT NOT NULL,
            component_canonical TEXT NOT NULL,
            PRIMARY KEY (cve_id, component_canonical)
        );
    "#),
    ("TABLE_COMPONENT_DICTIONARY", r#"
        CREATE TABLE IF NOT EXISTS component_dictionary (
            vendor TEXT NOT NULL,
            product TEXT NOT NULL,
            version TEXT NOT NULL,
            PRIMARY KEY (vendor, product, version)
        );
    "#),
    ("TABLE_COMPONENT_REFRESH", r#"
        CREATE TABLE IF NOT EXISTS component_refresh (
            component_canonical TEXT PRIMARY KEY,
            refreshed_at TEXT NOT NULL
        );
    "#),
    ("TABLE_ENRICHMENT_QUEUE", r#"
        CREATE TABLE IF NOT EXISTS enrichment_queue (
            job_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            scan_id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            residual INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'queued',
            attempts INTEGER NOT NULL DEFAULT 0,
            enqueued_at_ms INTEGER NOT NULL,
            enqueued_at TEXT NOT NULL,
            lease_expires_at_ms INTEGER,
            leased_by TEXT,
            last_error TEXT
        );
    "#),
    ("TABLE_ENRICHMENT_DEAD_LETTERS", r#"
        CREATE TABLE IF NOT EXISTS enrichment_dead_letters (
            job_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            scan_id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            attempts INTEGER NOT NULL,
            last_error TEXT NOT NULL,
            parked_at TEXT NOT NULL
        );
    "#),
    ("TABLE_QUEUE_FAIRNESS", r#"
        CREATE TABLE IF NOT EXISTS queue_fairness (
            tenant_id TEXT PRIMARY KEY,
            last_dispatched_at_ms INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_ENRICHMENT_CACHE", r#"
        CREATE TABLE IF NOT EXISTS enrichment_cache (
            cache_key TEXT PRIMARY KEY,
            verdict_blob BLOB NOT NULL,
            stored_at_ms INTEGER NOT NULL,
            expires_at_ms INTEGER NOT NULL
        );
    "#),
    ("TABLE_UPSTREAM_RATE_BUCKETS", r#"
        CREATE TABLE IF NOT EXISTS upstream_rate_buckets (
            source TEXT PRIMARY KEY,
            tokens REAL NOT NULL,
            updated_at_ms INTEGER NOT NULL
        );
    "#),
];

/**
 * ESTRATO 2: ACELERACIÓN (Índices de Despacho)
 * Cobertura: agente por tenant, scan por tenant, cve global,
 * severidad por tenant y selección de cola por estado.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_AGENTS_TENANT", "CREATE INDEX IF NOT EXISTS idx_agents_tenant ON agents(tenant_id);"),
    ("IDX_CREDENTIALS_AGENT", "CREATE INDEX IF NOT EXISTS idx_credentials_agent ON agent_credentials(agent_id);"),
    ("IDX_SCANS_TENANT_AGENT", "CREATE INDEX IF NOT EXISTS idx_scans_tenant_agent ON scans(tenant_id, agent_id);"),
    ("IDX_SCANS_STATUS", "CREATE INDEX IF NOT EXISTS idx_scans_status ON scans(enrichment_status);"),
    ("IDX_FINDINGS_TENANT_SCAN", "CREATE INDEX IF NOT EXISTS idx_findings_tenant_scan ON findings(tenant_id, scan_id);"),
    ("IDX_FINDINGS_CVE", "CREATE INDEX IF NOT EXISTS idx_findings_cve ON findings(cve_id);"),
    ("IDX_FINDINGS_TENANT_PRIORITY", "CREATE INDEX IF NOT EXISTS idx_findings_tenant_priority ON findings(tenant_id, priority);"),
    ("IDX_AFFECTED_COMPONENT", "CREATE INDEX IF NOT EXISTS idx_affected_component ON cve_affected_components(component_canonical);"),
    ("IDX_DICTIONARY_PRODUCT", "CREATE INDEX IF NOT EXISTS idx_dictionary_product ON component_dictionary(product);"),
    ("IDX_QUEUE_STATUS_TENANT", "CREATE INDEX IF NOT EXISTS idx_queue_status_tenant ON enrichment_queue(status, tenant_id);"),
    ("IDX_QUEUE_LEASE", "CREATE INDEX IF NOT EXISTS idx_queue_lease ON enrichment_queue(status, lease_expires_at_ms);"),
    ("IDX_CACHE_EXPIRY", "CREATE INDEX IF NOT EXISTS idx_cache_expiry ON enrichment_cache(expires_at_ms);"),
];

/// Sincroniza la estructura completa del Ledger de forma idempotente.
pub async fn apply_full_pipeline_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V3.5...");

    execute_table_solidification(database_connection).await?;
    execute_index_acceleration(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Pipeline Ledger V3.5 level and certified.");
    Ok(())
}

async fn execute_table_solidification(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        db.execute(*sql, ())
            .await
            .with_context(|| format!("SCHEMA_FAULT: Table genesis failed for {}", identifier))?;
    }
    Ok(())
}

async fn execute_index_acceleration(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        db.execute(*sql, ())
            .await
            .with_context(|| format!("SCHEMA_FAULT: Index acceleration failed for {}", identifier))?;
    }
    Ok(())
}
