// [tests/mirror/integration/scan_idempotency_test.rs]
/**
 * =================================================================
 * APARATO: SCAN IDEMPOTENCY CERTIFICATION (V3.2 - E2E)
 * CLASIFICACIÓN: E2E INTEGRATION / TRINITY EVIDENCE
 * RESPONSABILIDAD: MISMO DIGEST -> IDEMPOTENTE; DIGEST DISTINTO -> CONFLICT
 * =================================================================
 */

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use sentinel_domain_models::agent::AgentEnrollmentInfo;
use sentinel_infra_db::repositories::{AgentRepository, QueueRepository, TenantRepository};
use sentinel_infra_db::StoreClient;
use sentinel_orchestrator::config::IngestConfig;
use sentinel_orchestrator::routes::create_ingestion_router;
use sentinel_orchestrator::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn certification_config(max_dependencies: usize) -> IngestConfig {
    IngestConfig {
        operator_api_token: String::new(),
        enrollment_token_ttl_seconds: 900,
        credential_ttl_seconds: 3600,
        credential_rotation_overlap_seconds: 600,
        ingest_rate_per_second: 1000.0,
        ingest_burst: 1000.0,
        max_dependencies_per_scan: max_dependencies,
        max_payload_bytes: 5 * 1024 * 1024,
        heartbeat_silence_seconds: 300,
    }
}

async fn forge_environment(ledger_name: &str, max_dependencies: usize) -> (StoreClient, axum::Router, String) {
    let store_client =
        StoreClient::connect(&format!("file:{}?mode=memory&cache=shared", ledger_name), None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    TenantRepository::new(store_client.clone())
        .create_tenant("tenant-alpha", "Alpha Corp")
        .await
        .expect("FAULT");

    let agent_repository = AgentRepository::new(store_client.clone());
    let agent = agent_repository
        .enroll_agent(
            "tenant-alpha",
            &AgentEnrollmentInfo {
                hostname: "scanner-host".to_string(),
                operating_system: "alpine-3.20".to_string(),
                architecture: "x86_64".to_string(),
            },
        )
        .await
        .expect("FAULT");

    let credential = agent_repository
        .issue_credential(&agent.agent_id, "tenant-alpha", 3600)
        .await
        .expect("FAULT")
        .plaintext_secret;

    let router = create_ingestion_router(AppState::new(
        store_client.clone(),
        certification_config(max_dependencies),
    ));

    (store_client, router, credential)
}

fn scan_request(credential: &str, scan_id: &str, dependencies: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/agents/results")
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", credential))
        .body(Body::from(
            json!({
                "scan_id": scan_id,
                "started_at": "2026-07-30T10:00:00Z",
                "completed_at": "2026-07-30T10:00:05Z",
                "scan_status": "completed",
                "dependencies": dependencies
            })
            .to_string(),
        ))
        .expect("FAULT")
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("FAULT");
    serde_json::from_slice(&body_bytes).expect("FAULT")
}

/**
 * CERTIFICACIÓN: Re-entrega byte-idéntica acepta sin duplicar la cola;
 * contenido distinto aflora como 'conflict'.
 */
#[tokio::test]
async fn certify_idempotent_accept_and_conflict() {
    let (store_client, router, credential) = forge_environment("scan_idem_alpha", 2000).await;

    let identical_deps = json!([
        {"name": "nginx", "version": "1.21.0", "dependency_type": "package"},
        {"name": "openssl", "version": "3.0.2", "dependency_type": "package"}
    ]);

    // Entrega 1: sellado y encolado.
    let first = router
        .clone()
        .oneshot(scan_request(&credential, "scan-idem", identical_deps.clone()))
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(first.status(), StatusCode::OK);

    // Entrega 2 (idéntica): aceptación idempotente, sin segunda orden.
    let second = router
        .clone()
        .oneshot(scan_request(&credential, "scan-idem", identical_deps))
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(second.status(), StatusCode::OK);
    let second_envelope = read_json_body(second).await;
    assert_eq!(second_envelope["status"], json!("accepted-idempotent"));

    let counters = QueueRepository::new(store_client)
        .counters()
        .await
        .expect("FAULT");
    let total_depth: u64 = counters.depth_per_tenant.iter().map(|entry| entry.depth).sum();
    assert_eq!(total_depth, 1, "QUEUE_DUP_BREACH: idempotent accept enqueued twice.");

    // Entrega 3 (contenido mutado): conflicto.
    let mutated = router
        .oneshot(scan_request(
            &credential,
            "scan-idem",
            json!([{"name": "nginx", "version": "1.99.9", "dependency_type": "package"}]),
        ))
        .await
        .expect("ROUTER_FAULT");

    assert_eq!(mutated.status(), StatusCode::CONFLICT);
    let mutated_envelope = read_json_body(mutated).await;
    assert_eq!(mutated_envelope["error"]["code"], json!("conflict"));
}

/**
 * CERTIFICACIÓN: La lista vacía de dependencias acepta y encola.
 */
#[tokio::test]
async fn certify_empty_dependency_list_accepts() {
    let (store_client, router, credential) = forge_environment("scan_idem_empty", 2000).await;

    let response = router
        .oneshot(scan_request(&credential, "scan-empty", json!([])))
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(response.status(), StatusCode::OK);

    let counters = QueueRepository::new(store_client).counters().await.expect("FAULT");
    let total_depth: u64 = counters.depth_per_tenant.iter().map(|entry| entry.depth).sum();
    assert_eq!(total_depth, 1, "EMPTY_SCAN_BREACH: empty scan must still enqueue.");
}

/**
 * CERTIFICACIÓN: Validación estructural — nombre vacío, caracteres de
 * control en la versión y desborde del límite de lista.
 */
#[tokio::test]
async fn certify_structural_validation() {
    let (_store, router, credential) = forge_environment("scan_idem_validation", 2).await;

    // Nombre vacío.
    let nameless = router
        .clone()
        .oneshot(scan_request(
            &credential,
            "scan-nameless",
            json!([{"name": "  ", "version": "1.0", "dependency_type": "package"}]),
        ))
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(nameless.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(nameless).await["error"]["code"], json!("request-invalid"));

    // Caracteres de control en la versión.
    let control_chars = router
        .clone()
        .oneshot(scan_request(
            &credential,
            "scan-control",
            json!([{"name": "nginx", "version": "1.0\u{0007}", "dependency_type": "package"}]),
        ))
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(control_chars.status(), StatusCode::BAD_REQUEST);

    // Desborde del límite configurado (cap = 2).
    let overflow = router
        .oneshot(scan_request(
            &credential,
            "scan-overflow",
            json!([
                {"name": "a", "version": "1", "dependency_type": "package"},
                {"name": "b", "version": "1", "dependency_type": "package"},
                {"name": "c", "version": "1", "dependency_type": "package"}
            ]),
        ))
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(overflow.status(), StatusCode::BAD_REQUEST);
}
