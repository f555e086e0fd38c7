// [tests/mirror/integration/ingestion_pipeline_test.rs]
/**
 * =================================================================
 * APARATO: INGESTION PIPELINE CERTIFICATION (V3.3 - FULL PATH)
 * CLASIFICACIÓN: E2E INTEGRATION / TRINITY EVIDENCE
 * RESPONSABILIDAD: ENROLAR -> LATIDO -> SCAN -> DRENAJE -> HALLAZGOS
 *
 * # Logic:
 * Certifica la cadena de custodia completa sin intervención del
 * operador: el token acuña la credencial, el scan cruza la cola
 * durable, el worker drena y los hallazgos aparecen tenant-scoped
 * con la prioridad derivada de CVSS.
 * =================================================================
 */

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration as ChronoDuration, Utc};
use sentinel_domain_models::cve::{ComponentIdentifier, CveRecord};
use sentinel_enrich_worker_lib::config::WorkerConfig;
use sentinel_enrich_worker_lib::engine::EnrichWorkerEngine;
use sentinel_infra_db::repositories::{CveRepository, TenantRepository};
use sentinel_infra_db::StoreClient;
use sentinel_orchestrator::config::IngestConfig;
use sentinel_orchestrator::routes::create_ingestion_router;
use sentinel_orchestrator::state::AppState;
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower::ServiceExt;

fn certification_ingest_config() -> IngestConfig {
    IngestConfig {
        operator_api_token: String::new(),
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

fn certification_worker_config() -> WorkerConfig {
    WorkerConfig {
        worker_pool_size: 1,
        batch_size: 250,
        sub_batch_deadline_seconds: 10,
        queue_lease_seconds: 600,
        max_queue_attempts: 3,
        poll_interval_ms: 10,
        l1_capacity: 64,
        cache_l1_ttl_seconds: 60,
        cache_l2_ttl_seconds: 60,
        cve_freshness_ttl_seconds: 24 * 3600,
        candidate_limit: 10,
        similarity_threshold: 0.55,
        upstream_cve_endpoint: None,
        upstream_cve_api_key: None,
        upstream_rate_per_second: 1.0,
        upstream_burst: 5.0,
    }
}

/// Siembra el conocimiento de referencia: diccionario + CVE + frescura.
async fn seed_reference_knowledge(store_client: &StoreClient) {
    let cve_repository = CveRepository::new(store_client.clone());

    cve_repository
        .insert_dictionary_entry("f5", "nginx", "1.21.0")
        .await
        .expect("FAULT: dictionary seed collapsed.");

    cve_repository
        .upsert_cve_records(&[CveRecord {
            cve_id: "CVE-2021-23017".to_string(),
            description: "Off-by-one in ngx_resolver_copy.".to_string(),
            severity: "HIGH".to_string(),
            cvss_score: 7.7,
            published_at: Utc::now() - ChronoDuration::days(400),
            modified_at: Utc::now() - ChronoDuration::days(10),
            affected_components: vec!["f5:nginx:1.21.0".to_string()],
        }])
        .await
        .expect("FAULT: CVE seed collapsed.");

    // Frescura sellada: el motor opera sin upstream en este escenario.
    cve_repository
        .mark_refreshed(&ComponentIdentifier::new("f5", "nginx", "1.21.0"), Utc::now())
        .await
        .expect("FAULT: refresh seal collapsed.");
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("FAULT");
    serde_json::from_slice(&body_bytes).expect("FAULT")
}

/**
 * CERTIFICACIÓN: Recorrido completo del pipeline sin operador.
 */
#[tokio::test]
async fn certify_enroll_heartbeat_scan_findings_path() {
    println!("\n🔍 [AUDIT]: Initiating E2E Pipeline Certification...");

    // 1. IGNICIÓN DEL ESTRATO DE CONTROL
    let store_client =
        StoreClient::connect("file:pipeline_full_path?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    seed_reference_knowledge(&store_client).await;

    let tenant_repository = TenantRepository::new(store_client.clone());
    tenant_repository
        .create_tenant("tenant-alpha", "Alpha Corp")
        .await
        .expect("FAULT");
    let enrollment_token = tenant_repository
        .mint_enrollment_token("tenant-alpha", 3600)
        .await
        .expect("FAULT");

    let router = create_ingestion_router(AppState::new(
        store_client.clone(),
        certification_ingest_config(),
    ));

    // 2. ENROLAMIENTO (token T1 -> agente G1 + credencial)
    let enroll_envelope = read_json_body(
        router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/enrollment/enroll")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "enrollment_token": enrollment_token,
                            "agent_info": {
                                "hostname": "edge-host-01",
                                "operating_system": "ubuntu-22.04",
                                "architecture": "x86_64"
                            }
                        })
                        .to_string(),
                    ))
                    .expect("FAULT"),
            )
            .await
            .expect("ROUTER_FAULT"),
    )
    .await;

    let credential = enroll_envelope["credential"].as_str().expect("VOID").to_string();
    println!("   ✅ [VERDICT_A]: Agent credentialed.");

    // 3a. SNAPSHOT DE SISTEMA (LWW por agente)
    let system_info = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/system-info")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", credential))
                .body(Body::from(
                    json!({
                        "operating_system": "ubuntu-22.04",
                        "kernel_version": "6.8.0-45-generic",
                        "cpu_model": "AMD EPYC 7763",
                        "cpu_core_count": 16,
                        "memory_total_mb": 65536,
                        "storage_total_gb": 512,
                        "primary_ip_address": "10.20.30.40",
                        "primary_mac_address": "02:42:ac:11:00:02",
                        "location_hint": "eu-west-1"
                    })
                    .to_string(),
                ))
                .expect("FAULT"),
        )
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(system_info.status(), StatusCode::OK);

    // 3b. LATIDO DE VIDA
    let heartbeat = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/heartbeat")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", credential))
                .body(Body::from(
                    json!({"status": "healthy", "cpu_load_percent": 12.5, "memory_used_mb": 2048})
                        .to_string(),
                ))
                .expect("FAULT"),
        )
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(heartbeat.status(), StatusCode::OK);
    println!("   ✅ [VERDICT_B]: Heartbeat sealed.");

    // 4. REPORTE DE SCAN (S1 con nginx 1.21.0)
    let submission = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/results")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", credential))
                .body(Body::from(
                    json!({
                        "scan_id": "scan-s1",
                        "started_at": "2026-07-30T10:00:00Z",
                        "completed_at": "2026-07-30T10:00:05Z",
                        "scan_status": "completed",
                        "dependencies": [
                            {"name": "nginx", "version": "1.21.0", "dependency_type": "package"}
                        ]
                    })
                    .to_string(),
                ))
                .expect("FAULT"),
        )
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(submission.status(), StatusCode::OK);
    println!("   ✅ [VERDICT_C]: Scan durably acknowledged.");

    // 5. DRENAJE DEL WORKER (una orden, sin upstream)
    let executor = EnrichWorkerEngine::assemble(
        store_client.clone(),
        certification_worker_config(),
        Arc::new(AtomicBool::new(false)),
        "certification-node".to_string(),
    )
    .expect("FAULT: executor assembly collapsed.");

    let drained = executor.drain_single_job("certification-node#0").await.expect("FAULT");
    assert!(drained, "QUEUE_VOID: expected a pending enrichment job.");
    println!("   ✅ [VERDICT_D]: Worker drained the enrichment job.");

    // 6. LECTURA DE HALLAZGOS (tenant-scoped)
    let findings_envelope = read_json_body(
        router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/agents/scans/scan-s1/findings")
                    .header("Authorization", format!("Bearer {}", credential))
                    .body(Body::empty())
                    .expect("FAULT"),
            )
            .await
            .expect("ROUTER_FAULT"),
    )
    .await;

    let findings = findings_envelope["findings"].as_array().expect("VOID");
    assert!(!findings.is_empty(), "PIPELINE_BREACH: no findings materialized.");
    assert_eq!(findings[0]["cve_id"], json!("CVE-2021-23017"));
    assert_eq!(findings[0]["priority"], json!("high"), "PRIORITY_RULE: 7.7 => high.");
    println!("   ✅ [VERDICT_E]: Findings visible with derived priority.");

    // 7. ESTADO VISIBLE DEL SCAN
    let scan_envelope = read_json_body(
        router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/agents/scans/scan-s1")
                    .header("Authorization", format!("Bearer {}", credential))
                    .body(Body::empty())
                    .expect("FAULT"),
            )
            .await
            .expect("ROUTER_FAULT"),
    )
    .await;

    assert_eq!(scan_envelope["scan"]["enrichment_status"], json!("enriched"));
    println!("   ✅ [VERDICT_F]: Scan lifecycle sealed as enriched.");

    // 8. AUTORIDAD DEL SCAN MÁS RECIENTE Y SNAPSHOT PERSISTIDO
    let agent_id = enroll_envelope["agent_id"].as_str().expect("VOID");

    let latest_scan = sentinel_infra_db::repositories::ScanRepository::new(store_client.clone())
        .fetch_latest_scan_id("tenant-alpha", agent_id)
        .await
        .expect("FAULT");
    assert_eq!(latest_scan.as_deref(), Some("scan-s1"), "ORDERING_BREACH");

    let snapshot = sentinel_infra_db::repositories::AgentRepository::new(store_client)
        .fetch_system_info("tenant-alpha", agent_id)
        .await
        .expect("FAULT")
        .expect("VOID: system snapshot missing.");
    assert_eq!(snapshot.primary_ip_address, "10.20.30.40");
    println!("   ✅ [VERDICT_G]: Latest-scan authority and host snapshot sealed.\n");
}

/**
 * CERTIFICACIÓN: Un scan sin dependencias se enriquece trivialmente:
 * cero hallazgos y estado 'enriched' (distinguible de 'pending').
 */
#[tokio::test]
async fn certify_empty_scan_enriches_to_zero_findings() {
    let store_client =
        StoreClient::connect("file:pipeline_empty_scan?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let tenant_repository = TenantRepository::new(store_client.clone());
    tenant_repository.create_tenant("tenant-alpha", "Alpha Corp").await.expect("FAULT");
    let enrollment_token = tenant_repository
        .mint_enrollment_token("tenant-alpha", 3600)
        .await
        .expect("FAULT");

    let router = create_ingestion_router(AppState::new(
        store_client.clone(),
        certification_ingest_config(),
    ));

    let enroll_envelope = read_json_body(
        router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/enrollment/enroll")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "enrollment_token": enrollment_token,
                            "agent_info": {
                                "hostname": "empty-host",
                                "operating_system": "ubuntu-22.04",
                                "architecture": "x86_64"
                            }
                        })
                        .to_string(),
                    ))
                    .expect("FAULT"),
            )
            .await
            .expect("ROUTER_FAULT"),
    )
    .await;
    let credential = enroll_envelope["credential"].as_str().expect("VOID").to_string();

    let submission = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/results")
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", credential))
                .body(Body::from(
                    json!({
                        "scan_id": "scan-empty",
                        "started_at": "2026-07-30T11:00:00Z",
                        "completed_at": "2026-07-30T11:00:01Z",
                        "scan_status": "completed",
                        "dependencies": []
                    })
                    .to_string(),
                ))
                .expect("FAULT"),
        )
        .await
        .expect("ROUTER_FAULT");
    assert_eq!(submission.status(), StatusCode::OK);

    let executor = EnrichWorkerEngine::assemble(
        store_client,
        certification_worker_config(),
        Arc::new(AtomicBool::new(false)),
        "certification-node".to_string(),
    )
    .expect("FAULT");

    assert!(executor.drain_single_job("certification-node#0").await.expect("FAULT"));

    let scan_envelope = read_json_body(
        router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/agents/scans/scan-empty")
                    .header("Authorization", format!("Bearer {}", credential))
                    .body(Body::empty())
                    .expect("FAULT"),
            )
            .await
            .expect("ROUTER_FAULT"),
    )
    .await;

    assert_eq!(scan_envelope["scan"]["enrichment_status"], json!("enriched"));
    assert_eq!(scan_envelope["scan"]["dependency_count"], json!(0));
}
