// [apps/orchestrator/src/handlers/enrollment.rs]
/*!
 * =================================================================
 * APARATO: ENROLLMENT HANDSHAKE HANDLER (V3.5 - SWISS PRECISION)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ACUÑACIÓN DE IDENTIDAD, REGISTRO LEGACY Y ROTACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. EXACTLY-ONCE MINT: El canje del token y la acuñación de la
 *    credencial son la única vía de nacimiento de un agente; el
 *    secreto retorna una única vez y jamás es recuperable.
 * 2. TRANSIENT SHIELD: Las fallas transitorias del Ledger se
 *    reintentan internamente antes de aflorar como 'temporary'.
 * 3. LEGACY CITIZENSHIP: /agents/register acepta token o credencial,
 *    preservando el contrato histórico de los agentes desplegados.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::{extract_bearer_token, AgentPrincipal};
use crate::state::AppState;
use axum::{
    extract::{Json, Request, State},
    Extension,
};
use chrono::Utc;
use sentinel_domain_models::agent::AgentEnrollmentInfo;
use sentinel_infra_db::repositories::{AgentRepository, TenantRepository, TokenConsumeVerdict};
use sentinel_infra_db::DbError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

/// Presupuesto de reintentos internos ante fallas transitorias del Ledger.
const TRANSIENT_RETRY_BUDGET: u32 = 3;

#[derive(Debug, Deserialize)]
pub struct EnrollmentRequestPayload {
    pub enrollment_token: String,
    pub agent_info: AgentEnrollmentInfo,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponsePayload {
    pub success: bool,
    pub agent_id: String,
    pub tenant_id: String,
    /// Secreto portador: visible EXACTAMENTE una vez.
    pub credential: String,
    pub expires_at: String,
}

/// Payload del canal legacy: token o credencial en cabecera.
#[derive(Debug, Deserialize)]
pub struct RegisterRequestPayload {
    pub enrollment_token: Option<String>,
    pub agent_info: AgentEnrollmentInfo,
}

/// Reintento interno acotado sobre una operación del Ledger.
async fn with_transient_retry<T, F, Fut>(operation_factory: F) -> Result<T, DbError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, DbError>>,
{
    let mut last_fault = None;

    for attempt_index in 0..TRANSIENT_RETRY_BUDGET {
        match operation_factory().await {
            Ok(value) => return Ok(value),
            Err(fault) => {
                let is_transient = matches!(
                    fault,
                    DbError::ConnectionError(_) | DbError::TransactionError | DbError::QueryError(_)
                );

                if !is_transient {
                    return Err(fault);
                }

                warn!("🔁 [ENROLLMENT_RETRY]: Transient store fault on attempt {}: {}", attempt_index, fault);
                last_fault = Some(fault);
                tokio::time::sleep(std::time::Duration::from_millis(50 * (attempt_index as u64 + 1))).await;
            }
        }
    }

    Err(last_fault.unwrap_or(DbError::TransactionError))
}

/**
 * Endpoint: POST /enrollment/enroll
 *
 * Canjea un token de un solo uso por identidad de agente + credencial.
 */
#[instrument(skip(application_state, enrollment_payload))]
pub async fn handle_enroll(
    State(application_state): State<AppState>,
    Json(enrollment_payload): Json<EnrollmentRequestPayload>,
) -> Result<Json<EnrollmentResponsePayload>, ApiError> {
    if !enrollment_payload.agent_info.is_well_formed() {
        return Err(ApiError::RequestInvalid("AGENT_INFO_MALFORMED".to_string()));
    }

    let tenant_repository = TenantRepository::new(application_state.store_client.clone());

    // --- FASE 1: CANJE ATÓMICO DEL TOKEN ---
    let consume_verdict = with_transient_retry(|| {
        tenant_repository.consume_enrollment_token(&enrollment_payload.enrollment_token)
    })
    .await
    .map_err(|_| ApiError::Temporary)?;

    let tenant_id = match consume_verdict {
        TokenConsumeVerdict::Consumed { tenant_id } => tenant_id,
        TokenConsumeVerdict::Invalid => return Err(ApiError::TokenInvalid),
        TokenConsumeVerdict::TenantSuspended => return Err(ApiError::TenantSuspended),
    };

    // --- FASE 2: ACUÑACIÓN DE IDENTIDAD Y CREDENCIAL ---
    let agent_repository = AgentRepository::new(application_state.store_client.clone());

    let enrolled_agent = agent_repository
        .enroll_agent(&tenant_id, &enrollment_payload.agent_info)
        .await?;

    let minted_credential = agent_repository
        .issue_credential(
            &enrolled_agent.agent_id,
            &tenant_id,
            application_state.config.credential_ttl_seconds,
        )
        .await?;

    info!(
        "🎖️  [ENROLLMENT]: Agent [{}] credentialed under tenant [{}].",
        enrolled_agent.agent_id, tenant_id
    );

    Ok(Json(EnrollmentResponsePayload {
        success: true,
        agent_id: enrolled_agent.agent_id,
        tenant_id,
        credential: minted_credential.plaintext_secret,
        expires_at: minted_credential.expires_at,
    }))
}

/**
 * Endpoint: POST /agents/register (vía legacy)
 *
 * Con token: idéntico al enrolamiento. Con credencial: refresca el
 * material descriptivo del agente sin acuñar secretos nuevos.
 */
#[instrument(skip(application_state, request))]
pub async fn handle_register(
    State(application_state): State<AppState>,
    request: Request,
) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;

    let presented_bearer = extract_bearer_token(&request);

    let body_bytes = axum::body::to_bytes(
        request.into_body(),
        application_state.config.max_payload_bytes as usize,
    )
    .await
    .map_err(|_| ApiError::PayloadTooLarge)?;

    let register_payload: RegisterRequestPayload = serde_json::from_slice(&body_bytes)
        .map_err(|fault| ApiError::RequestInvalid(format!("BODY_MALFORMED: {}", fault)))?;

    if !register_payload.agent_info.is_well_formed() {
        return Err(ApiError::RequestInvalid("AGENT_INFO_MALFORMED".to_string()));
    }

    // --- ESCENARIO ALFA: CREDENCIAL EXISTENTE (REFRESCO) ---
    if let Some(presented_secret) = presented_bearer {
        let agent_repository = AgentRepository::new(application_state.store_client.clone());

        if let Some(resolution) = agent_repository.resolve_credential(&presented_secret).await? {
            agent_repository
                .refresh_enrollment_info(
                    &resolution.tenant_id,
                    &resolution.agent_id,
                    &register_payload.agent_info,
                )
                .await?;

            return Ok(Json(json!({
                "success": true,
                "agent_id": resolution.agent_id,
                "tenant_id": resolution.tenant_id,
                "timestamp": Utc::now().to_rfc3339(),
            }))
            .into_response());
        }
    }

    // --- ESCENARIO BETA: TOKEN DE ENROLAMIENTO ---
    let enrollment_token = register_payload
        .enrollment_token
        .ok_or(ApiError::Unauthorized)?;

    let enroll_response = handle_enroll(
        State(application_state),
        Json(EnrollmentRequestPayload {
            enrollment_token,
            agent_info: register_payload.agent_info,
        }),
    )
    .await?;

    Ok(enroll_response.into_response())
}

/**
 * Endpoint: POST /agents/credentials/rotate
 *
 * Acuña material nuevo preservando el agent_id; la credencial previa
 * sobrevive durante la ventana de solape configurada.
 */
#[instrument(skip(application_state), fields(agent = %principal.agent_id))]
pub async fn handle_credential_rotation(
    State(application_state): State<AppState>,
    Extension(principal): Extension<AgentPrincipal>,
) -> Result<Json<EnrollmentResponsePayload>, ApiError> {
    let agent_repository = AgentRepository::new(application_state.store_client.clone());

    let minted_credential = agent_repository
        .rotate_credential(
            &principal.credential_id,
            &principal.agent_id,
            &principal.tenant_id,
            application_state.config.credential_rotation_overlap_seconds,
            application_state.config.credential_ttl_seconds,
        )
        .await?;

    Ok(Json(EnrollmentResponsePayload {
        success: true,
        agent_id: principal.agent_id,
        tenant_id: principal.tenant_id,
        credential: minted_credential.plaintext_secret,
        expires_at: minted_credential.expires_at,
    }))
}
