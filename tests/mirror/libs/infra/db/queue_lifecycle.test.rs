// [tests/mirror/libs/infra/db/queue_lifecycle.test.rs]
/**
 * =================================================================
 * APARATO: QUEUE LIFECYCLE CERTIFICATION (V3.2 - TACTICAL LEDGER)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * RESPONSABILIDAD: LEASE, LIFO, NACK RESIDUAL, DEAD-LETTER Y CONTADORES
 * =================================================================
 */

use sentinel_domain_models::scan::DependencyRecord;
use sentinel_infra_db::repositories::{NackOutcome, QueueRepository};
use sentinel_infra_db::StoreClient;
use std::time::Duration;

fn dependency(name: &str) -> DependencyRecord {
    DependencyRecord {
        name: name.to_string(),
        version: Some("1.0.0".to_string()),
        dependency_type: "package".to_string(),
        vendor: None,
        location: None,
    }
}

async fn forge_queue(ledger_name: &str) -> QueueRepository {
    let client = StoreClient::connect(&format!("file:{}?mode=memory&cache=shared", ledger_name), None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    QueueRepository::new(client)
}

/**
 * CERTIFICACIÓN: Dentro de un tenant, el scan más nuevo precede al viejo.
 */
#[tokio::test]
async fn certify_lifo_priority_within_tenant() {
    let queue = forge_queue("queue_lifo").await;
    let deps = vec![dependency("nginx")];

    queue.enqueue("tenant-alpha", "scan-old", "agent-1", &deps).await.expect("FAULT");
    tokio::time::sleep(Duration::from_millis(5)).await;
    queue.enqueue("tenant-alpha", "scan-new", "agent-1", &deps).await.expect("FAULT");

    let leased = queue
        .acquire_next("worker-a", 600, 5)
        .await
        .expect("FAULT")
        .expect("QUEUE_VOID: expected a job.");

    assert_eq!(leased.job.scan_id, "scan-new", "LIFO_BREACH: newest scan must lead.");
    assert_eq!(leased.job.attempts, 1);
}

/**
 * CERTIFICACIÓN: Un lease expirado se reclama y la orden se re-entrega.
 */
#[tokio::test]
async fn certify_expired_lease_is_reclaimed() {
    let queue = forge_queue("queue_lease_recovery").await;

    queue
        .enqueue("tenant-alpha", "scan-zombie", "agent-1", &[dependency("nginx")])
        .await
        .expect("FAULT");

    // Arrendamiento con vida nula: expira de inmediato.
    let first_lease = queue.acquire_next("worker-dead", 0, 5).await.expect("FAULT");
    assert!(first_lease.is_some());

    tokio::time::sleep(Duration::from_millis(20)).await;

    let reclaimed = queue
        .acquire_next("worker-alive", 600, 5)
        .await
        .expect("FAULT")
        .expect("RECOVERY_BREACH: zombie lease not reclaimed.");

    assert_eq!(reclaimed.job.scan_id, "scan-zombie");
    assert_eq!(reclaimed.job.attempts, 2, "AT_LEAST_ONCE: attempts must accumulate.");
}

/**
 * CERTIFICACIÓN: El nack re-encola con el residuo y, agotado el
 * presupuesto, la orden aterriza en el dead-letter con su causa.
 */
#[tokio::test]
async fn certify_residual_nack_and_dead_letter() {
    let queue = forge_queue("queue_dead_letter").await;
    let full_payload = vec![dependency("nginx"), dependency("openssl")];
    let residual_payload = vec![dependency("openssl")];

    queue
        .enqueue("tenant-alpha", "scan-partial", "agent-1", &full_payload)
        .await
        .expect("FAULT");

    // Intento 1: nack con residuo -> re-encolada.
    let first = queue.acquire_next("worker-a", 600, 2).await.expect("FAULT").expect("VOID");
    let verdict = queue
        .negative_acknowledge(&first.job.job_id, "worker-a", "UPSTREAM_COLLAPSE", Some(&residual_payload), 2)
        .await
        .expect("FAULT");
    assert_eq!(verdict, NackOutcome::Requeued);

    // Intento 2: la orden re-entregada transporta solo el residuo.
    let second = queue.acquire_next("worker-a", 600, 2).await.expect("FAULT").expect("VOID");
    assert!(second.job.residual, "RESIDUAL_FLAG: retry must be marked residual.");
    assert_eq!(second.job.dependencies, residual_payload);
    assert_eq!(second.job.attempts, 2);

    // Presupuesto agotado: dead-letter con causa registrada.
    let final_verdict = queue
        .negative_acknowledge(&second.job.job_id, "worker-a", "UPSTREAM_COLLAPSE", Some(&residual_payload), 2)
        .await
        .expect("FAULT");
    assert_eq!(final_verdict, NackOutcome::DeadLettered);

    let dead_letters = queue.fetch_dead_letters(10).await.expect("FAULT");
    assert_eq!(dead_letters.len(), 1);
    assert_eq!(dead_letters[0].scan_id, "scan-partial");
    assert_eq!(dead_letters[0].last_error, "UPSTREAM_COLLAPSE");

    // La cola viva queda vacía; el dead-letter jamás re-entra.
    let drained = queue.acquire_next("worker-a", 600, 2).await.expect("FAULT");
    assert!(drained.is_none(), "DEAD_LETTER_BREACH: parked job re-entered the live queue.");
}

/**
 * CERTIFICACIÓN: El ack destruye la orden y la propiedad del lease
 * se verifica (un worker ajeno no puede confirmar).
 */
#[tokio::test]
async fn certify_acknowledge_ownership() {
    let queue = forge_queue("queue_ack_ownership").await;

    queue
        .enqueue("tenant-alpha", "scan-owned", "agent-1", &[dependency("nginx")])
        .await
        .expect("FAULT");

    let leased = queue.acquire_next("worker-owner", 600, 5).await.expect("FAULT").expect("VOID");

    let foreign_ack = queue.acknowledge(&leased.job.job_id, "worker-intruder").await;
    assert!(foreign_ack.is_err(), "OWNERSHIP_BREACH: foreign worker acknowledged a lease.");

    queue.acknowledge(&leased.job.job_id, "worker-owner").await.expect("FAULT");

    let counters = queue.counters().await.expect("FAULT");
    assert_eq!(counters.in_flight, 0);
    assert!(counters.depth_per_tenant.is_empty());
}

/**
 * CERTIFICACIÓN: Los contadores observables reflejan profundidad,
 * vuelo y edad del pendiente más antiguo.
 */
#[tokio::test]
async fn certify_observable_counters() {
    let queue = forge_queue("queue_counters").await;

    queue.enqueue("tenant-alpha", "scan-1", "agent-1", &[dependency("nginx")]).await.expect("FAULT");
    queue.enqueue("tenant-beta", "scan-2", "agent-2", &[dependency("nginx")]).await.expect("FAULT");

    let leased = queue.acquire_next("worker-a", 600, 5).await.expect("FAULT").expect("VOID");

    let counters = queue.counters().await.expect("FAULT");
    assert_eq!(counters.in_flight, 1);
    assert_eq!(counters.depth_per_tenant.len(), 1);
    assert_eq!(counters.dead_letter_depth, 0);

    queue.acknowledge(&leased.job.job_id, "worker-a").await.expect("FAULT");
}
