// [tests/mirror/libs/shared/heimdall/heimdall_integrity.test.rs]
/**
 * =================================================================
 * APARATO: HEIMDALL INTEGRITY CERTIFICATION (V3.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L4-OBSERVABILITY)
 * RESPONSABILIDAD: IGNICIÓN ÚNICA DEL SUSCRIPTOR Y HOOK DE PÁNICO
 *
 * # Logic:
 * El suscriptor global solo admite una ignición por proceso, por lo
 * que este aparato concentra toda la certificación en un único test.
 * =================================================================
 */

use sentinel_shared_heimdall::init_tracing;

/**
 * CERTIFICACIÓN: La ignición instala el suscriptor y el Phoenix Shield
 * sin colapsar, y el rastro posterior fluye sin pánico.
 */
#[test]
fn certify_single_ignition_and_trace_flow() {
    init_tracing("heimdall_certification");

    // El rastro fluye por el suscriptor recién instalado.
    tracing::info!("🧪 [PROVING_GROUNDS]: Trace flow operational.");
    tracing::warn!(component = "heimdall", "Structured fields accepted.");

    // El hook de pánico quedó instalado (reemplazable, jamás nulo).
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(previous_hook);
}
