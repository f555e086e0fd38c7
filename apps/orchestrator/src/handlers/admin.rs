// [apps/orchestrator/src/handlers/admin.rs]
/*!
 * =================================================================
 * APARATO: OPERATOR GOVERNANCE HANDLER (V3.4 - COMMAND CENTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PROVISIÓN DE TENANTS, TOKENS Y DIAGNÓSTICO DE COLA
 *
 * # Logic:
 * Superficie fuera de banda del operador: aquí nacen los tenants y
 * los tokens de enrolamiento que los agentes canjean después. Todo
 * acceso exige el token maestro del operador (guardia perimetral).
 * =================================================================
 */

use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::{Json, State};
use chrono::Utc;
use sentinel_domain_models::tenant::TenantStatus;
use sentinel_infra_db::repositories::{QueueRepository, TenantRepository};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct CreateTenantPayload {
    pub tenant_id: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct TenantStatusPayload {
    pub tenant_id: String,
    /// 'active' | 'suspended'
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MintTokenPayload {
    pub tenant_id: String,
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeTokenPayload {
    /// Huella SHA-256 del token a revocar (el secreto jamás viaja de vuelta).
    pub token_digest: String,
}

/**
 * Endpoint: POST /admin/tenants
 */
#[instrument(skip(application_state, payload))]
pub async fn handle_create_tenant(
    State(application_state): State<AppState>,
    Json(payload): Json<CreateTenantPayload>,
) -> Result<Json<Value>, ApiError> {
    if payload.tenant_id.trim().is_empty() {
        return Err(ApiError::RequestInvalid("TENANT_ID_VOID".to_string()));
    }

    let tenant_repository = TenantRepository::new(application_state.store_client.clone());
    tenant_repository
        .create_tenant(&payload.tenant_id, &payload.display_name)
        .await?;

    Ok(Json(json!({
        "success": true,
        "tenant_id": payload.tenant_id,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/**
 * Endpoint: POST /admin/tenants/status
 */
#[instrument(skip(application_state, payload))]
pub async fn handle_tenant_status_transition(
    State(application_state): State<AppState>,
    Json(payload): Json<TenantStatusPayload>,
) -> Result<Json<Value>, ApiError> {
    let target_status = match payload.status.as_str() {
        "active" => TenantStatus::Active,
        "suspended" => TenantStatus::Suspended,
        other => {
            return Err(ApiError::RequestInvalid(format!("TENANT_STATUS_UNKNOWN: {}", other)));
        }
    };

    let tenant_repository = TenantRepository::new(application_state.store_client.clone());
    tenant_repository
        .set_tenant_status(&payload.tenant_id, &target_status)
        .await?;

    info!("🏛️  [GOVERNANCE]: Tenant [{}] transitioned to [{}].", payload.tenant_id, payload.status);

    Ok(Json(json!({
        "success": true,
        "tenant_id": payload.tenant_id,
        "status": payload.status,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/**
 * Endpoint: POST /admin/enrollment-tokens
 *
 * El secreto del token viaja al operador EXACTAMENTE una vez.
 */
#[instrument(skip(application_state, payload))]
pub async fn handle_mint_enrollment_token(
    State(application_state): State<AppState>,
    Json(payload): Json<MintTokenPayload>,
) -> Result<Json<Value>, ApiError> {
    let time_to_live = payload
        .ttl_seconds
        .unwrap_or(application_state.config.enrollment_token_ttl_seconds);

    let tenant_repository = TenantRepository::new(application_state.store_client.clone());
    let plaintext_token = tenant_repository
        .mint_enrollment_token(&payload.tenant_id, time_to_live)
        .await?;

    Ok(Json(json!({
        "success": true,
        "tenant_id": payload.tenant_id,
        "enrollment_token": plaintext_token,
        "ttl_seconds": time_to_live,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/**
 * Endpoint: DELETE /admin/enrollment-tokens
 */
#[instrument(skip(application_state, payload))]
pub async fn handle_revoke_enrollment_token(
    State(application_state): State<AppState>,
    Json(payload): Json<RevokeTokenPayload>,
) -> Result<Json<Value>, ApiError> {
    let tenant_repository = TenantRepository::new(application_state.store_client.clone());
    tenant_repository
        .revoke_enrollment_token(&payload.token_digest)
        .await?;

    Ok(Json(json!({
        "success": true,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/**
 * Endpoint: GET /admin/queue/diagnostics
 *
 * Contadores observables de la cola: profundidad por tenant, vuelo,
 * dead-letter y edad de la orden pendiente más antigua.
 */
#[instrument(skip(application_state))]
pub async fn handle_queue_diagnostics(
    State(application_state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let queue_repository = QueueRepository::new(application_state.store_client.clone());

    let counters = queue_repository.counters().await?;
    let dead_letters = queue_repository.fetch_dead_letters(25).await?;

    Ok(Json(json!({
        "success": true,
        "counters": counters,
        "dead_letters": dead_letters,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
