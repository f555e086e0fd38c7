// [tests/mirror/libs/infra/db/rate_budget.test.rs]
/**
 * =================================================================
 * APARATO: GLOBAL RATE BUDGET CERTIFICATION (V3.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * RESPONSABILIDAD: EL GASTO AGREGADO JAMÁS EXCEDE EL CONTRATO UPSTREAM
 *
 * # Mathematical Proof (Bounded Spend):
 * Con capacity C y refill r, el número de Granted en una ventana W
 * está acotado por C + r*W. Con r = 0 el límite es exactamente C.
 * =================================================================
 */

use sentinel_infra_db::repositories::{RateDecision, RateLimitRepository};
use sentinel_infra_db::StoreClient;

async fn forge_budget(ledger_name: &str) -> RateLimitRepository {
    let client = StoreClient::connect(&format!("file:{}?mode=memory&cache=shared", ledger_name), None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    RateLimitRepository::new(client)
}

/**
 * CERTIFICACIÓN: Sin recarga, el gasto está acotado por la capacidad.
 */
#[tokio::test]
async fn certify_spend_bounded_by_capacity() {
    let budget = forge_budget("rate_budget_capacity").await;

    let mut granted_count = 0;
    for _ in 0..10 {
        match budget.try_acquire("primary-cve-source", 3.0, 0.0).await.expect("FAULT") {
            RateDecision::Granted => granted_count += 1,
            RateDecision::Denied { retry_after_ms } => {
                assert!(retry_after_ms > 0, "RETRY_HINT_VOID: denial must carry a hint.");
            }
        }
    }

    assert_eq!(granted_count, 3, "BUDGET_BREACH: spend exceeded documented capacity.");
}

/**
 * CERTIFICACIÓN: El bucket es compartido entre 'procesos' (dos
 * repositorios sobre el mismo Ledger gastan el mismo presupuesto).
 */
#[tokio::test]
async fn certify_budget_is_fleet_wide() {
    let client = StoreClient::connect("file:rate_budget_fleet?mode=memory&cache=shared", None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let worker_one = RateLimitRepository::new(client.clone());
    let worker_two = RateLimitRepository::new(client);

    let mut granted_count = 0;
    for repository in [&worker_one, &worker_two, &worker_one, &worker_two] {
        if let RateDecision::Granted = repository
            .try_acquire("shared-source", 2.0, 0.0)
            .await
            .expect("FAULT")
        {
            granted_count += 1;
        }
    }

    assert_eq!(granted_count, 2, "FLEET_BREACH: per-process buckets detected.");
}

/**
 * CERTIFICACIÓN: Fuentes distintas portan buckets independientes.
 */
#[tokio::test]
async fn certify_per_source_isolation() {
    let budget = forge_budget("rate_budget_sources").await;

    assert_eq!(
        budget.try_acquire("source-alpha", 1.0, 0.0).await.expect("FAULT"),
        RateDecision::Granted
    );
    assert!(matches!(
        budget.try_acquire("source-alpha", 1.0, 0.0).await.expect("FAULT"),
        RateDecision::Denied { .. }
    ));

    // La fuente hermana conserva su presupuesto intacto.
    assert_eq!(
        budget.try_acquire("source-beta", 1.0, 0.0).await.expect("FAULT"),
        RateDecision::Granted
    );
}
