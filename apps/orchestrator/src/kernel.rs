// INICIO DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
/*!
 * =================================================================
 * APARATO: INGESTION KERNEL (V3.4 - GRACEFUL AUTHORITY)
 * CLASIFICACIÓN: APPLICATION KERNEL (ESTRATO L1-APP)
 * RESPONSABILIDAD: IGNICIÓN DE ESTADO, DAEMONS Y TRANSPORTE HTTP
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El enlace al Ledger se sella ANTES de abrir el socket TCP: ningún
 * agente puede reportar contra un esquema aún no cristalizado. El
 * apagado ordenado deja de aceptar tráfico nuevo y drena el vuelo;
 * los leases retenidos expiran y la cola re-entrega.
 * =================================================================
 */

use crate::config::IngestConfig;
use crate::routes::create_ingestion_router;
use crate::services::reconciler::spawn_reconciler;
use crate::state::AppState;
use sentinel_infra_db::StoreClient;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, instrument, warn};

pub struct IngestionKernel {
    pub server_network_port: u16,
    pub application_shared_state: AppState,
}

impl IngestionKernel {
    /**
     * Realiza la ignición del cliente táctico y el estado del hub.
     */
    #[instrument(skip(database_access_token))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
    ) -> Self {
        let store_client = StoreClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Database link collapse. Ignition aborted.");

        let ingest_config = IngestConfig::from_environment();

        Self {
            server_network_port: listening_port,
            application_shared_state: AppState::new(store_client, ingest_config),
        }
    }

    /**
     * Lanza los daemons de fondo y el servidor Axum con apagado ordenado.
     */
    pub async fn launch_pipeline_operations(self) {
        let shared_application_state = self.application_shared_state.clone();

        // --- 1. DAEMON DE RECONCILIACIÓN (No Silent Drop) ---
        spawn_reconciler(shared_application_state.clone()).await;

        // --- 2. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let ingestion_router = create_ingestion_router(shared_application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("CRITICAL_FAULT: Static bind address malformed."),
            self.server_network_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Ingestion Command Center listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        let graceful_shutdown_signal = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⚠️ [KERNEL]: Termination requested. Draining in-flight requests...");
            }
        };

        if let Err(server_error) = axum::serve(tcp_listener, ingestion_router)
            .with_graceful_shutdown(graceful_shutdown_signal)
            .await
        {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }

        info!("🏁 [KERNEL]: Shutdown sequence concluded. Ingestion hub offline.");
    }
}
// FIN DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
