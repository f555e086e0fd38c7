// [libs/domain/models/src/queue.rs]
/*!
 * =================================================================
 * APARATO: QUEUE DOMAIN MODELS (V3.2 - TACTICAL LEDGER DTO)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DE ÓRDENES DE ENRIQUECIMIENTO Y OBSERVABILIDAD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AT-LEAST-ONCE: La orden porta 'attempts' para el presupuesto de
 *    reintentos; el arrendamiento de visibilidad vive en el Ledger.
 * 2. RESIDUAL RETRY: Una orden residual transporta únicamente las
 *    dependencias cuyo sub-lote falló, jamás el scan completo.
 * 3. PANOPTICON SYNC: Los contadores alimentan el endpoint de
 *    diagnóstico para visibilidad total del operador.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::scan::DependencyRecord;

/// Orden de trabajo de enriquecimiento despachada por la cola durable.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub job_id: String,
    pub tenant_id: String,
    pub scan_id: String,
    pub agent_id: String,
    pub dependencies: Vec<DependencyRecord>,
    /// Marca de reintento parcial: solo el residuo de un fallo previo.
    pub residual: bool,
    #[typeshare(serialized_as = "number")]
    pub attempts: u32,
    pub enqueued_at: String,
}

/// Registro de una orden aparcada tras agotar su presupuesto de reintentos.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub job_id: String,
    pub tenant_id: String,
    pub scan_id: String,
    pub dependencies: Vec<DependencyRecord>,
    #[typeshare(serialized_as = "number")]
    pub attempts: u32,
    pub last_error: String,
    pub parked_at: String,
}

/// Profundidad de cola viva para un tenant concreto.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantQueueDepth {
    pub tenant_id: String,
    #[typeshare(serialized_as = "number")]
    pub depth: u64,
}

/// Instantánea de contadores observables de la cola (Diagnóstico L5).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCounters {
    pub depth_per_tenant: Vec<TenantQueueDepth>,
    #[typeshare(serialized_as = "number")]
    pub in_flight: u64,
    #[typeshare(serialized_as = "number")]
    pub dead_letter_depth: u64,
    /// Edad en segundos de la orden pendiente más antigua (0 si vacía).
    #[typeshare(serialized_as = "number")]
    pub oldest_pending_age_seconds: u64,
}
