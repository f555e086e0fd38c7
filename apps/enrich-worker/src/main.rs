// [apps/enrich-worker/src/main.rs]
/*!
 * =================================================================
 * APARATO: ENRICH WORKER SHELL (V3.3 - ZENITH SHELL)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL MOTOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ARCHITECTURAL PURITY: El shell es un Switchboard puro de
 *    configuración y señales; la operación completa vive en el
 *    'EnrichWorkerEngine'.
 * 2. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta en argumentos,
 *    señales y clientes.
 *
 * # Mathematical Proof (Deterministic Init):
 * El uso de Arc<AtomicBool> garantiza que la señal de apagado se
 * propague sin condiciones de carrera entre los workers del pool.
 * =================================================================
 */

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use sentinel_enrich_worker_lib::config::WorkerConfig;
use sentinel_enrich_worker_lib::engine::EnrichWorkerEngine;
use sentinel_infra_db::StoreClient;
use sentinel_shared_heimdall::init_tracing;

/**
 * Directivas de mando para el nodo de enriquecimiento.
 * Configuración inyectada vía CLI o variables de entorno C2.
 */
#[derive(Parser, Debug)]
#[command(
    author = "Sentinel Platform Team",
    version = "3.3",
    about = "Sentinel Enrichment Node // Durable queue consumer"
)]
struct WorkerDirectives {
    /// Enlace al Ledger táctico (libSQL/Turso).
    #[arg(long, env = "DATABASE_URL")]
    database_connection_url: String,

    /// Token de acceso para clusters remotos de Turso.
    #[arg(long, env = "DATABASE_AUTH_TOKEN")]
    database_access_token: Option<String>,

    /// Identificador unívoco del nodo en la flota de enriquecimiento.
    #[arg(long, env = "WORKER_NODE_IDENTIFIER", default_value = "enrich-node-alpha")]
    worker_node_identifier: String,
}

/**
 * Punto de ignición del binario del trabajador.
 */
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 1. INICIALIZACIÓN DEL SISTEMA DE OBSERVABILIDAD
    init_tracing("sentinel_enrich_worker");

    info!("💠 [SHELL]: Enrichment node ignition sequence starting...");

    // 2. PARSEO DE DIRECTIVAS ESTRATÉGICAS
    let worker_directives = WorkerDirectives::parse();
    let worker_config = WorkerConfig::from_environment();

    // 3. PROTOCOLO DE SEÑALES DE SISTEMA (Terminación Ordenada)
    let termination_signal_atomic = Arc::new(AtomicBool::new(false));
    let signal_flag_reference = Arc::clone(&termination_signal_atomic);

    tokio::spawn(async move {
        if (tokio::signal::ctrl_c().await).is_ok() {
            warn!("⚠️ [SIGNAL]: Termination requested by host. Draining worker pool...");
            signal_flag_reference.store(true, Ordering::SeqCst);
        }
    });

    // 4. ENLACE AL LEDGER TÁCTICO
    let store_client = StoreClient::connect(
        &worker_directives.database_connection_url,
        worker_directives.database_access_token,
    )
    .await
    .map_err(|link_fault| anyhow::anyhow!("DATABASE_LINK_FAULT: {}", link_fault))?;

    // 5. ENSAMBLAJE E IGNICIÓN DEL MOTOR DE ENRIQUECIMIENTO
    let executor_engine = Arc::new(EnrichWorkerEngine::assemble(
        store_client,
        worker_config,
        termination_signal_atomic,
        worker_directives.worker_node_identifier,
    )?);

    info!("🚀 [SHELL]: Handing control to EnrichWorkerEngine. Transitioning to OPERATIONAL.");

    executor_engine.ignite_pipeline_operations().await;

    info!("🏁 [SHELL]: Shutdown sequence concluded. Enrichment node offline.");
    Ok(())
}
