// [apps/enrich-worker/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ENRICH WORKER LIBRARY ROOT (V3.0)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: DEFINICIÓN DEL ÁRBOL DE MÓDULOS DEL TRABAJADOR
 * =================================================================
 */

/// Adaptador del presupuesto global de tasa sobre el Ledger.
pub mod budget;
/// Configuración reconocida del entorno C2 del trabajador.
pub mod config;
/// Motor de ejecución: pool de workers, sub-loteo y persistencia.
pub mod engine;

pub use budget::StoreRateBudget;
pub use config::WorkerConfig;
pub use engine::EnrichWorkerEngine;
