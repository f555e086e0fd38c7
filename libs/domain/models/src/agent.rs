// [libs/domain/models/src/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT DOMAIN MODELS (V3.2 - LIVENESS CONTRACTS)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIDAD DE AGENTES, CREDENCIALES Y BIOMETRÍA DE HOST
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SOFT ARCHIVE ONLY: El agente jamás se elimina físicamente; los
 *    hallazgos históricos referencian su identidad de forma perpetua.
 * 2. CREDENTIAL AUTHORITY: El tenant derivado de la credencial es el
 *    ÚNICO tenant sobre el que una petición autenticada puede escribir.
 * 3. LWW SNAPSHOTS: SystemInfo es last-writer-wins por agente, sin
 *    dependencia causal con los scans.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estados de vida de un agente desplegado en un host monitorizado.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// El agente reportó un latido dentro de la ventana de silencio.
    Online,
    /// El agente superó la ventana de silencio sin latidos.
    Stale,
    /// Archivado por un operador; conserva hallazgos históricos.
    Archived,
}

/// Entidad de agente acuñada durante el enrolamiento.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub tenant_id: String,
    pub hostname: String,
    pub operating_system: String,
    pub architecture: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: AgentStatus,
}

/// Material descriptivo del host presentado durante el enrolamiento.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEnrollmentInfo {
    pub hostname: String,
    pub operating_system: String,
    pub architecture: String,
}

impl AgentEnrollmentInfo {
    /// Validación estructural mínima previa a la acuñación de identidad.
    pub fn is_well_formed(&self) -> bool {
        !self.hostname.trim().is_empty()
            && !self.operating_system.trim().is_empty()
            && !self.architecture.trim().is_empty()
    }
}

/// Latido de vida con métricas ligeras de silicio.
/// Actualiza last-seen y liveness; jamás entra a la cola de enriquecimiento.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatReport {
    pub status: String,
    pub cpu_load_percent: f32,
    pub memory_used_mb: u64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Instantánea completa del host (last-writer-wins por agente).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfoSnapshot {
    pub operating_system: String,
    pub kernel_version: String,
    pub cpu_model: String,
    pub cpu_core_count: u32,
    pub memory_total_mb: u64,
    pub storage_total_gb: u64,
    pub primary_ip_address: String,
    pub primary_mac_address: String,
    /// Localización de mejor esfuerzo reportada por el agente.
    pub location_hint: Option<String>,
}
