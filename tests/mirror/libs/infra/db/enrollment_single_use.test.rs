// [tests/mirror/libs/infra/db/enrollment_single_use.test.rs]
/**
 * =================================================================
 * APARATO: ENROLLMENT SINGLE-USE CERTIFICATION (V3.1 - RACE PROOF)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * RESPONSABILIDAD: UN TOKEN ACUÑA A LO SUMO UNA CREDENCIAL
 *
 * # Mathematical Proof (Race-Safe Single Use):
 * El UPDATE guardado por 'consumed_at IS NULL' serializa el canje:
 * bajo N intentos concurrentes exactamente uno observa
 * rows_affected = 1. Este suite certifica el caso secuencial y la
 * carrera de doble canje.
 * =================================================================
 */

use sentinel_domain_models::tenant::TenantStatus;
use sentinel_infra_db::repositories::{TenantRepository, TokenConsumeVerdict};
use sentinel_infra_db::StoreClient;

async fn forge_tenant_with_token(ledger_name: &str) -> (TenantRepository, String) {
    let client = StoreClient::connect(&format!("file:{}?mode=memory&cache=shared", ledger_name), None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let repository = TenantRepository::new(client);
    repository
        .create_tenant("tenant-alpha", "Alpha Corp")
        .await
        .expect("FAULT: tenant genesis collapsed.");

    let token = repository
        .mint_enrollment_token("tenant-alpha", 3600)
        .await
        .expect("FAULT: token mint collapsed.");

    (repository, token)
}

/**
 * CERTIFICACIÓN: El segundo canje del mismo token es 'Invalid'.
 */
#[tokio::test]
async fn certify_sequential_replay_is_rejected() {
    let (repository, token) = forge_tenant_with_token("single_use_sequential").await;

    let first_verdict = repository.consume_enrollment_token(&token).await.expect("FAULT");
    assert_eq!(
        first_verdict,
        TokenConsumeVerdict::Consumed { tenant_id: "tenant-alpha".to_string() }
    );

    let replay_verdict = repository.consume_enrollment_token(&token).await.expect("FAULT");
    assert_eq!(replay_verdict, TokenConsumeVerdict::Invalid, "REPLAY_BREACH: token consumed twice.");
}

/**
 * CERTIFICACIÓN: Bajo carrera, exactamente un canje triunfa.
 * Un fallo transitorio del motor cuenta como no-consumido.
 */
#[tokio::test]
async fn certify_concurrent_double_redeem_yields_one_credential() {
    let (repository, token) = forge_tenant_with_token("single_use_race").await;

    let (left_verdict, right_verdict) = tokio::join!(
        repository.consume_enrollment_token(&token),
        repository.consume_enrollment_token(&token),
    );

    let consumed_count = [left_verdict, right_verdict]
        .into_iter()
        .filter(|verdict| matches!(verdict, Ok(TokenConsumeVerdict::Consumed { .. })))
        .count();

    assert_eq!(consumed_count, 1, "RACE_BREACH: expected exactly one successful redemption.");
}

/**
 * CERTIFICACIÓN: Un token expirado jamás acuña, y un tenant suspendido
 * bloquea el canje de sus tokens vigentes.
 */
#[tokio::test]
async fn certify_expired_and_suspended_paths() {
    let (repository, _) = forge_tenant_with_token("single_use_expiry").await;

    // Token con vida negativa: nace expirado.
    let expired_token = repository
        .mint_enrollment_token("tenant-alpha", -1)
        .await
        .expect("FAULT: token mint collapsed.");

    let expired_verdict = repository.consume_enrollment_token(&expired_token).await.expect("FAULT");
    assert_eq!(expired_verdict, TokenConsumeVerdict::Invalid);

    // Tenant suspendido: el token vigente queda bloqueado.
    let healthy_token = repository
        .mint_enrollment_token("tenant-alpha", 3600)
        .await
        .expect("FAULT: token mint collapsed.");

    repository
        .set_tenant_status("tenant-alpha", &TenantStatus::Suspended)
        .await
        .expect("FAULT: status transition collapsed.");

    let suspended_verdict = repository.consume_enrollment_token(&healthy_token).await.expect("FAULT");
    assert_eq!(suspended_verdict, TokenConsumeVerdict::TenantSuspended);
}
