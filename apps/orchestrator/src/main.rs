// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT (V3.2 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que la sinapsis con el Ledger ocurra antes
 * que la apertura del socket TCP, previniendo estados de carrera
 * donde un agente reporte contra un esquema aún no cristalizado.
 * =================================================================
 */

use sentinel_orchestrator::prelude::*;

use dotenvy::dotenv;
use sentinel_shared_heimdall::init_tracing;
use tracing::info;

/**
 * Punto de ignición supremo del binario del Orquestador.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD NEURAL (HEIMDALL)
    init_tracing("sentinel_orchestrator");

    // 3. CONFIGURACIÓN DEL RUNTIME SOBERANO
    let runtime_orchestrator = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_orchestrator.block_on(async {
        info!("🛰️  [COMMAND_CENTER]: Global ignition sequence starting...");

        // 4. ADQUISICIÓN DE COORDENADAS TÁCTICAS
        let database_connection_url = std::env::var("DATABASE_URL")
            .expect("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment.");

        let database_access_token = std::env::var("DATABASE_AUTH_TOKEN").ok();

        let listening_network_port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        // 5. CONSTRUCCIÓN DEL KERNEL SOBERANO (ESTRATO L1-APP)
        let kernel_instance = IngestionKernel::ignite(
            &database_connection_url,
            database_access_token,
            listening_network_port,
        )
        .await;

        // 6. IGNICIÓN DE OPERACIONES DEL PIPELINE
        info!("🚀 [SENTINEL_ONLINE]: System fully operational on port {}.", listening_network_port);
        kernel_instance.launch_pipeline_operations().await;

        Ok(())
    })
}
