// [apps/orchestrator/src/errors.rs]
/*!
 * =================================================================
 * APARATO: API ERROR ENVELOPE (V3.3 - CONTRACT SEALED)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CONTRATO ÚNICO DE ERRORES HACIA AGENTES Y OPERADOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SEALED SHAPE: Toda falla viaja como
 *    {success:false, error:{code, message, details?}, timestamp}.
 * 2. DETAIL DISCIPLINE: El estrato 'internal' jamás filtra detalle
 *    técnico al cliente; el rastro completo vive en Heimdall.
 * 3. RETRY HINTS: Los rechazos de tasa portan la pista de reintento.
 * =================================================================
 */

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use chrono::Utc;
use sentinel_infra_db::DbError;
use serde_json::json;
use tracing::error;

/// Taxonomía de fallos visibles en la superficie HTTP.
#[derive(Debug)]
pub enum ApiError {
    /// Token de enrolamiento desconocido, revocado, expirado o consumido.
    TokenInvalid,
    /// Entrada malformada del agente; no se reintenta ni se encola.
    RequestInvalid(String),
    /// Credencial ausente, inválida o revocada.
    Unauthorized,
    /// Presupuesto de tasa agotado para la credencial o el tenant.
    RateLimited { retry_after_ms: u64 },
    /// El cuerpo supera el límite configurado.
    PayloadTooLarge,
    /// Violación de idempotencia: mismo scan_id, contenido distinto.
    Conflict,
    /// El tenant vinculado está suspendido.
    TenantSuspended,
    /// Falla transitoria de infraestructura; el trabajo fue preservado.
    Temporary,
    /// Colapso interno; detalle solo en el rastro.
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::TokenInvalid => "token-invalid",
            ApiError::RequestInvalid(_) => "request-invalid",
            ApiError::Unauthorized => "unauthorized",
            ApiError::RateLimited { .. } => "rate-limited",
            ApiError::PayloadTooLarge => "payload-too-large",
            ApiError::Conflict => "conflict",
            ApiError::TenantSuspended => "tenant-suspended",
            ApiError::Temporary => "temporary",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::TokenInvalid => StatusCode::UNAUTHORIZED,
            ApiError::RequestInvalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::TenantSuspended => StatusCode::FORBIDDEN,
            ApiError::Temporary => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::TokenInvalid => "Enrollment token is not redeemable.".to_string(),
            ApiError::RequestInvalid(detail) => detail.clone(),
            ApiError::Unauthorized => "Credential missing, expired or revoked.".to_string(),
            ApiError::RateLimited { .. } => "Ingestion rate budget exhausted.".to_string(),
            ApiError::PayloadTooLarge => "Report body exceeds the configured cap.".to_string(),
            ApiError::Conflict => "Scan identifier already sealed with different content.".to_string(),
            ApiError::TenantSuspended => "Tenant is suspended; reports are rejected.".to_string(),
            ApiError::Temporary => "Transient infrastructure fault; retry later.".to_string(),
            ApiError::Internal(_) => "Internal fault recorded.".to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(database_fault: DbError) -> Self {
        match database_fault {
            DbError::NotFound => ApiError::RequestInvalid("ENTITY_NOT_FOUND".to_string()),
            DbError::Conflict => ApiError::Conflict,
            other => {
                error!("🗄️ [STORE_FAULT]: {}", other);
                ApiError::Temporary
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!("🔥 [INTERNAL_FAULT]: {}", detail);
        }

        let details = match &self {
            ApiError::RateLimited { retry_after_ms } => {
                Some(json!({ "retry_after_ms": retry_after_ms }))
            }
            _ => None,
        };

        let envelope = json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.message(),
                "details": details,
            },
            "timestamp": Utc::now().to_rfc3339(),
        });

        (self.status(), Json(envelope)).into_response()
    }
}
