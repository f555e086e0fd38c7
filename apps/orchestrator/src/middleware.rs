// [apps/orchestrator/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: GALVANIC AUTHENTICATION GUARD (V3.4 - TENANT AUTHORITY)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: CREDENCIAL -> TENANT ANTES DE PARSEAR EL CUERPO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE AUTHORITY: El tenant se resuelve desde la credencial y se
 *    inyecta como extensión; cualquier campo de tenant en el cuerpo es
 *    ruido advisory y jamás se consulta. Este es el único mecanismo
 *    que previene escrituras cruzadas entre tenants.
 * 2. DUAL CITIZENSHIP: La superficie /admin exige el token maestro del
 *    operador; la superficie de agentes exige credencial portadora.
 * 3. PAYLOAD SHIELD: El guardián de carga rechaza cuerpos sobre el
 *    límite configurado antes de tocar el parser JSON.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::services::rate_governor::GovernorVerdict;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sentinel_infra_db::repositories::AgentRepository;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Identidad soberana extraída del túnel de seguridad.
/// Inyectada como extensión para consumo en los estratos de handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPrincipal {
    pub credential_id: String,
    pub agent_id: String,
    /// El ÚNICO tenant sobre el que esta petición puede escribir.
    pub tenant_id: String,
}

/// Extrae el token portador de la cabecera Authorization.
pub fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|header_content| header_content.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/**
 * Guardia de Credencial: el portero soberano del canal de agentes.
 *
 * # Logic:
 * 1. Resuelve la credencial portadora contra el Ledger.
 * 2. Debita los buckets de tasa (credencial y tenant).
 * 3. Inyecta 'AgentPrincipal' para los estratos inferiores.
 */
pub async fn credential_guard(
    State(application_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented_secret = extract_bearer_token(&request).ok_or(ApiError::Unauthorized)?;

    let agent_repository = AgentRepository::new(application_state.store_client.clone());
    let resolution = agent_repository
        .resolve_credential(&presented_secret)
        .await?
        .ok_or_else(|| {
            warn!("❌ [AUTH_REJECTION]: Unresolvable credential material.");
            ApiError::Unauthorized
        })?;

    // --- GOBERNANZA DE TASA: CREDENCIAL Y TENANT ---
    let capacity = application_state.config.ingest_burst;
    let refill = application_state.config.ingest_rate_per_second;

    for bucket_key in [
        format!("credential:{}", resolution.credential_id),
        format!("tenant:{}", resolution.tenant_id),
    ] {
        if let GovernorVerdict::Throttled { retry_after_ms } =
            application_state.rate_governor.take(&bucket_key, capacity, refill)
        {
            return Err(ApiError::RateLimited { retry_after_ms });
        }
    }

    debug!("🤖 [AUTH]: Agent [{}] recognized under tenant [{}].", resolution.agent_id, resolution.tenant_id);

    request.extensions_mut().insert(AgentPrincipal {
        credential_id: resolution.credential_id,
        agent_id: resolution.agent_id,
        tenant_id: resolution.tenant_id,
    });

    Ok(next.run(request).await)
}

/**
 * Guardia del Operador: protege la superficie de gobernanza /admin.
 * Un token maestro vacío deshabilita la superficie por completo.
 */
pub async fn operator_guard(
    State(application_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let operator_token = &application_state.config.operator_api_token;

    if operator_token.is_empty() {
        warn!("⛔ [OPERATOR_SURFACE]: Governance disabled (no master token configured).");
        return Err(ApiError::Unauthorized);
    }

    match extract_bearer_token(&request) {
        Some(presented) if &presented == operator_token => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}

/**
 * Guardia de Carga: rechaza cuerpos sobre el límite configurado
 * ANTES de que el parser JSON consuma memoria.
 */
pub async fn payload_guard(
    State(application_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let declared_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|raw| raw.parse::<u64>().ok());

    if let Some(body_bytes) = declared_length {
        if body_bytes > application_state.config.max_payload_bytes {
            return Err(ApiError::PayloadTooLarge);
        }
    }

    Ok(next.run(request).await)
}
