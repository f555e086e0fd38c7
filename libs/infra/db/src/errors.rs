// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V3.2 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONFIGURATION AWARENESS: 'ConfigurationError' distingue fallos
 *    de red de variables de entorno vacías o malformadas.
 * 2. PANOPTICON COMPLIANCE: Mensajes con prefijos de estrato para su
 *    renderizado cromático en el Dashboard.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DE GOBERNANZA DE IDENTIDAD ---

    /// La entidad solicitada no existe dentro del tenant autenticado.
    #[error("[L3_GOVERNANCE_FAULT]: ENTITY_NOT_FOUND")]
    NotFound,

    /// Violación de idempotencia: mismo identificador, contenido distinto.
    #[error("[L3_GOVERNANCE_FAULT]: CONTENT_CONFLICT")]
    Conflict,

    // --- ESTRATO DE COLA TÁCTICA ---

    /// La orden no pertenece al worker que intenta confirmarla.
    #[error("[L3_QUEUE_FAULT]: LEASE_OWNERSHIP_VIOLATION")]
    LeaseOwnershipConflict,
}
