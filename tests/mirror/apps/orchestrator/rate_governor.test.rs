// [tests/mirror/apps/orchestrator/rate_governor.test.rs]
/**
 * =================================================================
 * APARATO: RATE GOVERNOR CERTIFICATION (V3.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L4-SECURITY)
 * RESPONSABILIDAD: BUCKETS DE INGESTA CON PISTA DE REINTENTO
 * =================================================================
 */

use sentinel_orchestrator::services::rate_governor::{GovernorVerdict, RateGovernor};

/**
 * CERTIFICACIÓN: El gasto sin recarga está acotado por la ráfaga y la
 * denegación porta una pista de reintento positiva.
 */
#[test]
fn certify_burst_bound_and_retry_hint() {
    let governor = RateGovernor::new();

    let mut admitted_count = 0;
    for _ in 0..5 {
        match governor.take("credential:alpha", 2.0, 0.5) {
            GovernorVerdict::Admitted => admitted_count += 1,
            GovernorVerdict::Throttled { retry_after_ms } => {
                assert!(retry_after_ms > 0, "HINT_VOID: throttle verdict without retry hint.");
            }
        }
    }

    assert_eq!(admitted_count, 2, "BURST_BREACH: spend exceeded bucket capacity.");
}

/**
 * CERTIFICACIÓN: Los buckets son independientes por clave nominal
 * (credencial y tenant gobiernan cupos separados).
 */
#[test]
fn certify_bucket_isolation() {
    let governor = RateGovernor::new();

    assert_eq!(governor.take("credential:alpha", 1.0, 0.0), GovernorVerdict::Admitted);
    assert!(matches!(
        governor.take("credential:alpha", 1.0, 0.0),
        GovernorVerdict::Throttled { .. }
    ));

    // El bucket del tenant permanece intacto.
    assert_eq!(governor.take("tenant:alpha", 1.0, 0.0), GovernorVerdict::Admitted);
}
