// [apps/orchestrator/src/state.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE HUB (V3.2 - COMPOSITION ROOT)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: PLACA BASE DE CLIENTE, CONFIGURACIÓN Y GOBERNANZA
 *
 * # Mathematical Proof (Deterministic State Hub):
 * El estado es inmutable tras la ignición (Arc<T>); los repositorios
 * se construyen por uso sobre el cliente compartido, garantizando que
 * toda escritura fluya por el mismo Ledger táctico.
 * =================================================================
 */

use crate::config::IngestConfig;
use crate::services::rate_governor::RateGovernor;
use sentinel_infra_db::StoreClient;
use std::sync::Arc;

/// Contenedor de estado compartido (Thread-Safe) del orquestador.
#[derive(Clone)]
pub struct AppState {
    /// Cliente táctico hacia el Motor A (libSQL/Turso).
    pub store_client: StoreClient,
    /// Configuración capturada del entorno C2.
    pub config: Arc<IngestConfig>,
    /// Gobernador de tasa de ingesta (por credencial y por tenant).
    pub rate_governor: Arc<RateGovernor>,
}

impl AppState {
    pub fn new(store_client: StoreClient, config: IngestConfig) -> Self {
        Self {
            store_client,
            config: Arc::new(config),
            rate_governor: Arc::new(RateGovernor::new()),
        }
    }
}
