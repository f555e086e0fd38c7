// INICIO DEL ARCHIVO [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V3.6 - INGESTION TOPOLOGY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA DE ENROLAMIENTO, REPORTE Y GOBERNANZA
 *
 * VISION HIPER-HOLÍSTICA:
 * La topología separa tres ciudadanías:
 * 1. Enrolamiento (token de un solo uso, sin credencial previa).
 * 2. Canal de agentes (credencial portadora + gobernanza de tasa).
 * 3. Superficie del operador (token maestro /admin).
 * =================================================================
 */

use crate::handlers::{admin, agents, enrollment, scans};
use crate::middleware::{credential_guard, operator_guard, payload_guard};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
    http::{header, Method},
};
use tower_http::cors::{Any, CorsLayer};
use std::time::Duration;

pub fn create_ingestion_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: CORS para el Dashboard y herramientas de Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE REPORTE: Canal autenticado por credencial portadora.
    let agent_reporting_stratum = Router::new()
        // Latidos de Vida (Biometría ligera)
        .route("/heartbeat", post(agents::handle_heartbeat))
        // Snapshot completo del host (LWW)
        .route("/system-info", post(agents::handle_system_info))
        // Canal de resultados de scan (idempotente + encolado durable)
        .route("/results", post(scans::handle_submit_scan))
        // Lecturas tenant-scoped para agentes y pruebas E2E
        .route("/scans/:scan_id", get(scans::handle_get_scan))
        .route("/scans/:scan_id/findings", get(scans::handle_get_scan_findings))
        // Protocolo Phoenix (rotación de material portador)
        .route("/credentials/rotate", post(enrollment::handle_credential_rotation))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), credential_guard))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), payload_guard))
        // Vía legacy: token o credencial (fuera del guardia de credencial)
        .route("/register", post(enrollment::handle_register));

    // ESTRATO DE GOBERNANZA: Superficie del operador.
    let operator_stratum = Router::new()
        .route("/tenants", post(admin::handle_create_tenant))
        .route("/tenants/status", post(admin::handle_tenant_status_transition))
        .route(
            "/enrollment-tokens",
            post(admin::handle_mint_enrollment_token).delete(admin::handle_revoke_enrollment_token),
        )
        .route("/queue/diagnostics", get(admin::handle_queue_diagnostics))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), operator_guard));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .route("/enrollment/enroll", post(enrollment::handle_enroll))
        .nest("/agents", agent_reporting_stratum)
        .nest("/admin", operator_stratum)
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
// FIN DEL ARCHIVO [apps/orchestrator/src/routes.rs]
