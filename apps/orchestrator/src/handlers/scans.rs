// [apps/orchestrator/src/handlers/scans.rs]
/*!
 * =================================================================
 * APARATO: SCAN INGESTION HANDLER (V3.6 - NO SILENT DROP)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CANAL DE RESULTADOS Y LECTURAS TENANT-SCOPED
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DURABLE ACK: El scan se reconoce en cuanto queda durablemente
 *    encolado o aparcado en 'awaiting-enrichment'; la ingesta jamás
 *    bloquea sobre el enriquecimiento.
 * 2. CONTENT SEAL: La idempotencia por (tenant, scan_id) se decide
 *    por digest canónico; contenido distinto aflora como 'conflict'.
 * 3. TENANT FROM CREDENTIAL: El tenant del principal inyectado es la
 *    única autoridad de escritura; el cuerpo jamás lo decide.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::AgentPrincipal;
use crate::state::AppState;
use axum::{
    extract::{Json, Path, State},
    Extension,
};
use chrono::Utc;
use sentinel_domain_models::scan::{EnrichmentStatus, ScanSubmission};
use sentinel_infra_db::repositories::{FindingRepository, QueueRepository, ScanInsertVerdict, ScanRepository};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

/// Validación estructural del reporte previo al sellado.
fn validate_submission(
    submission: &ScanSubmission,
    max_dependencies: usize,
) -> Result<(), ApiError> {
    if submission.scan_id.trim().is_empty() {
        return Err(ApiError::RequestInvalid("SCAN_ID_VOID".to_string()));
    }

    if submission.dependencies.len() > max_dependencies {
        return Err(ApiError::RequestInvalid(format!(
            "DEPENDENCY_LIST_OVERFLOW: {} > {}",
            submission.dependencies.len(),
            max_dependencies
        )));
    }

    for dependency in &submission.dependencies {
        if dependency.name.trim().is_empty() {
            return Err(ApiError::RequestInvalid("DEPENDENCY_NAME_VOID".to_string()));
        }

        if let Some(version) = &dependency.version {
            if version.chars().any(|character| character.is_control()) {
                return Err(ApiError::RequestInvalid("DEPENDENCY_VERSION_CONTROL_CHARS".to_string()));
            }
        }
    }

    Ok(())
}

/**
 * Endpoint: POST /agents/results
 *
 * # Logic:
 * 1. Validación estructural acotada.
 * 2. Sellado idempotente por (tenant, scan_id) + digest.
 * 3. Encolado durable; ante fallo de cola el scan queda aparcado en
 *    'awaiting-enrichment' para el reconciliador. Jamás se descarta.
 */
#[instrument(skip(application_state, submission), fields(agent = %principal.agent_id, scan = %submission.scan_id))]
pub async fn handle_submit_scan(
    State(application_state): State<AppState>,
    Extension(principal): Extension<AgentPrincipal>,
    Json(submission): Json<ScanSubmission>,
) -> Result<Json<Value>, ApiError> {
    validate_submission(&submission, application_state.config.max_dependencies_per_scan)?;

    let content_digest = submission.dependency_content_digest();
    let scan_repository = ScanRepository::new(application_state.store_client.clone());

    let insert_verdict = scan_repository
        .insert_scan(&principal.tenant_id, &principal.agent_id, &submission, &content_digest)
        .await?;

    match insert_verdict {
        ScanInsertVerdict::DuplicateConflicting => return Err(ApiError::Conflict),
        ScanInsertVerdict::DuplicateIdentical => {
            // Re-entrega idéntica: aceptación idempotente sin re-encolar.
            return Ok(Json(json!({
                "success": true,
                "scan_id": submission.scan_id,
                "status": "accepted-idempotent",
                "timestamp": Utc::now().to_rfc3339(),
            })));
        }
        ScanInsertVerdict::Inserted => {}
    }

    // --- ENCOLADO DURABLE (EL ACK DEPENDE DE ESTA FASE) ---
    let queue_repository = QueueRepository::new(application_state.store_client.clone());

    let enqueue_result = queue_repository
        .enqueue(
            &principal.tenant_id,
            &submission.scan_id,
            &principal.agent_id,
            &submission.dependencies,
        )
        .await;

    let visible_status = match enqueue_result {
        Ok(_) => "accepted",
        Err(enqueue_fault) => {
            // Aparcamiento recuperable: el reconciliador re-encolará.
            error!("📪 [QUEUE_FAULT]: Scan [{}] parked awaiting enrichment: {}", submission.scan_id, enqueue_fault);

            scan_repository
                .set_enrichment_status(
                    &principal.tenant_id,
                    &submission.scan_id,
                    &EnrichmentStatus::AwaitingEnrichment,
                    Some(&enqueue_fault.to_string()),
                )
                .await?;

            "accepted-awaiting-enrichment"
        }
    };

    info!("📦 [INGESTION]: Scan [{}] acknowledged ({}).", submission.scan_id, visible_status);

    Ok(Json(json!({
        "success": true,
        "scan_id": submission.scan_id,
        "status": visible_status,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/**
 * Endpoint: GET /agents/scans/:scan_id
 *
 * Estado del ciclo de vida del scan (tenant del principal únicamente).
 */
#[instrument(skip(application_state), fields(tenant = %principal.tenant_id))]
pub async fn handle_get_scan(
    State(application_state): State<AppState>,
    Extension(principal): Extension<AgentPrincipal>,
    Path(scan_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let scan_repository = ScanRepository::new(application_state.store_client.clone());

    let scan_record = scan_repository
        .fetch_scan(&principal.tenant_id, &scan_id)
        .await?
        .ok_or_else(|| ApiError::RequestInvalid("SCAN_NOT_FOUND".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "scan": scan_record,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/**
 * Endpoint: GET /agents/scans/:scan_id/findings
 *
 * Conjunto de hallazgos del scan, sellado por (dependencia, cve).
 */
#[instrument(skip(application_state), fields(tenant = %principal.tenant_id))]
pub async fn handle_get_scan_findings(
    State(application_state): State<AppState>,
    Extension(principal): Extension<AgentPrincipal>,
    Path(scan_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let finding_repository = FindingRepository::new(application_state.store_client.clone());

    let findings = finding_repository
        .fetch_findings_for_scan(&principal.tenant_id, &scan_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "scan_id": scan_id,
        "findings": findings,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
