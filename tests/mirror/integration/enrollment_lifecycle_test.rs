// [tests/mirror/integration/enrollment_lifecycle_test.rs]
/**
 * =================================================================
 * APARATO: ENROLLMENT LIFECYCLE CERTIFICATION (V3.2 - E2E)
 * CLASIFICACIÓN: E2E INTEGRATION / TRINITY EVIDENCE
 * RESPONSABILIDAD: ENROLAR, REPETIR, COMPETIR Y ROTAR CREDENCIALES
 *
 * # Performance:
 * Ejecución en runtime de Tokio con aislamiento de base de datos en
 * memoria y certificación del router en proceso (tower oneshot).
 * =================================================================
 */

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use sentinel_infra_db::repositories::TenantRepository;
use sentinel_infra_db::StoreClient;
use sentinel_orchestrator::config::IngestConfig;
use sentinel_orchestrator::routes::create_ingestion_router;
use sentinel_orchestrator::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Configuración nominal para el Proving Grounds (sin tocar el entorno).
fn certification_config() -> IngestConfig {
    IngestConfig {
        operator_api_token: "sovereign_test_secret_2026".to_string(),
        enrollment_token_ttl_seconds: 900,
        credential_ttl_seconds: 3600,
        credential_rotation_overlap_seconds: 600,
        ingest_rate_per_second: 1000.0,
        ingest_burst: 1000.0,
        max_dependencies_per_scan: 2000,
        max_payload_bytes: 5 * 1024 * 1024,
        heartbeat_silence_seconds: 300,
    }
}

async fn forge_environment(ledger_name: &str) -> (AppState, String) {
    let store_client =
        StoreClient::connect(&format!("file:{}?mode=memory&cache=shared", ledger_name), None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let tenant_repository = TenantRepository::new(store_client.clone());
    tenant_repository
        .create_tenant("tenant-alpha", "Alpha Corp")
        .await
        .expect("FAULT: tenant genesis collapsed.");

    let enrollment_token = tenant_repository
        .mint_enrollment_token("tenant-alpha", 3600)
        .await
        .expect("FAULT: token mint collapsed.");

    (AppState::new(store_client, certification_config()), enrollment_token)
}

fn enroll_request(token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/enrollment/enroll")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "enrollment_token": token,
                "agent_info": {
                    "hostname": "workstation-07",
                    "operating_system": "ubuntu-22.04",
                    "architecture": "x86_64"
                }
            })
            .to_string(),
        ))
        .expect("FAULT: request forge collapsed.")
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("FAULT: body drain collapsed.");
    serde_json::from_slice(&body_bytes).expect("FAULT: envelope decoding collapsed.")
}

/**
 * CERTIFICACIÓN: Canje exitoso + replay rechazado con 'token-invalid'.
 */
#[tokio::test]
async fn certify_enroll_then_replay_is_rejected() {
    let (application_state, enrollment_token) = forge_environment("enroll_replay").await;
    let router = create_ingestion_router(application_state);

    // --- FASE 1: CANJE NOMINAL ---
    let first_response = router
        .clone()
        .oneshot(enroll_request(&enrollment_token))
        .await
        .expect("CRITICAL_FAULT: Router failed to process signal.");

    assert_eq!(first_response.status(), StatusCode::OK);
    let first_envelope = read_json_body(first_response).await;

    assert_eq!(first_envelope["success"], json!(true));
    assert_eq!(first_envelope["tenant_id"], json!("tenant-alpha"));
    let credential = first_envelope["credential"].as_str().expect("VOID: credential missing.");
    assert!(credential.starts_with("cred_"), "SECRET_SHAPE: unexpected credential material.");

    // --- FASE 2: REPLAY DEL MISMO TOKEN ---
    let replay_response = router
        .oneshot(enroll_request(&enrollment_token))
        .await
        .expect("CRITICAL_FAULT: Router failed to process signal.");

    assert_eq!(replay_response.status(), StatusCode::UNAUTHORIZED);
    let replay_envelope = read_json_body(replay_response).await;
    assert_eq!(replay_envelope["success"], json!(false));
    assert_eq!(replay_envelope["error"]["code"], json!("token-invalid"));
}

/**
 * CERTIFICACIÓN: Bajo doble canje concurrente nace EXACTAMENTE una
 * credencial.
 */
#[tokio::test]
async fn certify_concurrent_enrollment_race() {
    let (application_state, enrollment_token) = forge_environment("enroll_race").await;
    let router = create_ingestion_router(application_state);

    let (left_response, right_response) = tokio::join!(
        router.clone().oneshot(enroll_request(&enrollment_token)),
        router.clone().oneshot(enroll_request(&enrollment_token)),
    );

    let statuses = [
        left_response.expect("ROUTER_FAULT").status(),
        right_response.expect("ROUTER_FAULT").status(),
    ];

    let success_count = statuses.iter().filter(|status| **status == StatusCode::OK).count();
    assert_eq!(success_count, 1, "RACE_BREACH: expected exactly one minted credential.");
}

/**
 * CERTIFICACIÓN: La rotación acuña material nuevo preservando el
 * agent_id; la credencial previa sobrevive la ventana de solape.
 */
#[tokio::test]
async fn certify_rotation_preserves_identity_with_overlap() {
    let (application_state, enrollment_token) = forge_environment("enroll_rotation").await;
    let router = create_ingestion_router(application_state);

    let enroll_envelope = read_json_body(
        router
            .clone()
            .oneshot(enroll_request(&enrollment_token))
            .await
            .expect("ROUTER_FAULT"),
    )
    .await;

    let original_agent_id = enroll_envelope["agent_id"].as_str().expect("VOID").to_string();
    let original_credential = enroll_envelope["credential"].as_str().expect("VOID").to_string();

    // --- ROTACIÓN ---
    let rotation_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/credentials/rotate")
                .header("Authorization", format!("Bearer {}", original_credential))
                .body(Body::empty())
                .expect("FAULT"),
        )
        .await
        .expect("ROUTER_FAULT");

    assert_eq!(rotation_response.status(), StatusCode::OK);
    let rotation_envelope = read_json_body(rotation_response).await;

    assert_eq!(
        rotation_envelope["agent_id"].as_str().expect("VOID"),
        original_agent_id,
        "IDENTITY_BREACH: rotation minted a new agent."
    );

    let fresh_credential = rotation_envelope["credential"].as_str().expect("VOID").to_string();
    assert_ne!(fresh_credential, original_credential);

    // --- AMBAS CREDENCIALES LATEN DURANTE EL SOLAPE ---
    for live_credential in [&original_credential, &fresh_credential] {
        let heartbeat_response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/agents/heartbeat")
                    .header("Content-Type", "application/json")
                    .header("Authorization", format!("Bearer {}", live_credential))
                    .body(Body::from(
                        json!({"status": "healthy", "cpu_load_percent": 3.5, "memory_used_mb": 512})
                            .to_string(),
                    ))
                    .expect("FAULT"),
            )
            .await
            .expect("ROUTER_FAULT");

        assert_eq!(heartbeat_response.status(), StatusCode::OK, "OVERLAP_BREACH");
    }
}

/**
 * CERTIFICACIÓN: La vía legacy /agents/register acepta token de
 * enrolamiento y también credencial existente.
 */
#[tokio::test]
async fn certify_legacy_register_dual_citizenship() {
    let (application_state, enrollment_token) = forge_environment("enroll_legacy").await;
    let router = create_ingestion_router(application_state);

    // Ciudadanía A: token de enrolamiento.
    let register_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/register")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "enrollment_token": enrollment_token,
                        "agent_info": {
                            "hostname": "legacy-host",
                            "operating_system": "windows-11",
                            "architecture": "arm64"
                        }
                    })
                    .to_string(),
                ))
                .expect("FAULT"),
        )
        .await
        .expect("ROUTER_FAULT");

    assert_eq!(register_response.status(), StatusCode::OK);
    let register_envelope = read_json_body(register_response).await;
    let credential = register_envelope["credential"].as_str().expect("VOID").to_string();

    // Ciudadanía B: credencial existente (refresco sin secretos nuevos).
    let refresh_response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/register")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", credential))
                .body(Body::from(
                    json!({
                        "agent_info": {
                            "hostname": "legacy-host-renamed",
                            "operating_system": "windows-11",
                            "architecture": "arm64"
                        }
                    })
                    .to_string(),
                ))
                .expect("FAULT"),
        )
        .await
        .expect("ROUTER_FAULT");

    assert_eq!(refresh_response.status(), StatusCode::OK);
    let refresh_envelope = read_json_body(refresh_response).await;
    assert!(refresh_envelope.get("credential").is_none() || refresh_envelope["credential"].is_null(),
        "SECRET_LEAK: refresh path must never mint credentials.");
}
