// [apps/orchestrator/src/handlers/agents.rs]
/*!
 * =================================================================
 * APARATO: AGENT LIVENESS HANDLER (V3.3 - BIOMETRÍA DE HOST)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: LATIDOS DE VIDA Y SNAPSHOTS DE SISTEMA
 *
 * # Logic:
 * Ambos canales son last-writer-wins y jamás tocan la cola de
 * enriquecimiento: el tráfico de liveness no se mezcla con el
 * trabajo de resolución CVE.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::AgentPrincipal;
use crate::state::AppState;
use axum::{extract::{Json, State}, Extension};
use chrono::Utc;
use sentinel_domain_models::agent::{HeartbeatReport, SystemInfoSnapshot};
use sentinel_infra_db::repositories::AgentRepository;
use serde_json::{json, Value};
use tracing::{debug, instrument};

/**
 * Endpoint: POST /agents/heartbeat
 *
 * Actualiza last-seen y liveness del agente autenticado.
 */
#[instrument(skip(application_state, heartbeat_report), fields(agent = %principal.agent_id))]
pub async fn handle_heartbeat(
    State(application_state): State<AppState>,
    Extension(principal): Extension<AgentPrincipal>,
    Json(heartbeat_report): Json<HeartbeatReport>,
) -> Result<Json<Value>, ApiError> {
    let agent_repository = AgentRepository::new(application_state.store_client.clone());

    agent_repository
        .record_heartbeat(&principal.tenant_id, &principal.agent_id, &heartbeat_report)
        .await?;

    debug!("💓 [LIVENESS]: Heartbeat sealed for agent [{}].", principal.agent_id);

    Ok(Json(json!({
        "success": true,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/**
 * Endpoint: POST /agents/system-info
 *
 * Reemplazo atómico del snapshot completo del host (LWW por agente).
 */
#[instrument(skip(application_state, snapshot), fields(agent = %principal.agent_id))]
pub async fn handle_system_info(
    State(application_state): State<AppState>,
    Extension(principal): Extension<AgentPrincipal>,
    Json(snapshot): Json<SystemInfoSnapshot>,
) -> Result<Json<Value>, ApiError> {
    if snapshot.operating_system.trim().is_empty() {
        return Err(ApiError::RequestInvalid("OPERATING_SYSTEM_VOID".to_string()));
    }

    let agent_repository = AgentRepository::new(application_state.store_client.clone());

    agent_repository
        .replace_system_info(&principal.tenant_id, &principal.agent_id, &snapshot)
        .await?;

    Ok(Json(json!({
        "success": true,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
