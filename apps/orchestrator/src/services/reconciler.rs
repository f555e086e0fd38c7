// [apps/orchestrator/src/services/reconciler.rs]
/*!
 * =================================================================
 * APARATO: THE RECONCILER SYSTEM SERVICE (V3.5 - NO SILENT DROP)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: RE-ENCOLADO DE SCANS APARCADOS Y BARRIDOS DE HIGIENE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AT-LEAST-ONCE SEAL: Todo scan aparcado en 'awaiting-enrichment'
 *    vuelve a la cola durable en el arranque y en cada ciclo; ningún
 *    scan aceptado se pierde en silencio.
 * 2. CREDENTIAL SWEEP: Revoca material expirado sin tocar jamás la
 *    identidad del agente (agent_id histórico preservado).
 * 3. LIVENESS TRANSITION: online -> stale tras la ventana de silencio.
 * 4. CACHE HYGIENE: Purga de entradas L2 expiradas.
 * =================================================================
 */

use crate::state::AppState;
use sentinel_domain_models::scan::EnrichmentStatus;
use sentinel_infra_db::repositories::{
    AgentRepository, QueueRepository, ScanRepository, SharedCacheRepository,
};
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

/// Cadencia del ciclo de reconciliación.
const RECONCILE_INTERVAL_SECONDS: u64 = 30;
/// Lote máximo de scans aparcados por ciclo.
const PARKED_SCAN_BATCH: usize = 100;

/**
 * Inicia el daemon de reconciliación perpetua en el runtime de Tokio.
 * El primer ciclo corre de inmediato para cubrir el arranque.
 */
pub async fn spawn_reconciler(application_state: AppState) {
    let mut reconcile_ticker = interval(Duration::from_secs(RECONCILE_INTERVAL_SECONDS));

    tokio::spawn(async move {
        info!("🧭 [RECONCILER_ACTIVE]: Pipeline integrity daemon initiated.");

        loop {
            reconcile_ticker.tick().await;

            if let Err(cycle_fault) = execute_reconcile_cycle(&application_state).await {
                error!("🧭 [RECONCILER_FAULT]: Cycle aborted: {}", cycle_fault);
            }
        }
    });
}

async fn execute_reconcile_cycle(application_state: &AppState) -> anyhow::Result<()> {
    let scan_repository = ScanRepository::new(application_state.store_client.clone());
    let queue_repository = QueueRepository::new(application_state.store_client.clone());
    let agent_repository = AgentRepository::new(application_state.store_client.clone());
    let cache_repository = SharedCacheRepository::new(application_state.store_client.clone());

    // --- FASE 1: RE-ENCOLADO DE SCANS APARCADOS ---
    let parked_scans = scan_repository
        .fetch_scans_awaiting_enrichment(PARKED_SCAN_BATCH)
        .await?;

    for (tenant_id, scan_id, agent_id) in parked_scans {
        if queue_repository.has_live_job_for_scan(&tenant_id, &scan_id).await? {
            // Orden viva ya presente; solo nivelamos el estado visible.
            scan_repository
                .set_enrichment_status(&tenant_id, &scan_id, &EnrichmentStatus::Pending, None)
                .await?;
            continue;
        }

        let dependencies = scan_repository
            .fetch_scan_dependencies(&tenant_id, &scan_id)
            .await?;

        match queue_repository
            .enqueue(&tenant_id, &scan_id, &agent_id, &dependencies)
            .await
        {
            Ok(_) => {
                scan_repository
                    .set_enrichment_status(&tenant_id, &scan_id, &EnrichmentStatus::Pending, None)
                    .await?;
                info!("📬 [RECONCILER]: Parked scan [{}] re-enqueued for tenant [{}].", scan_id, tenant_id);
            }
            Err(enqueue_fault) => {
                warn!("📪 [RECONCILER]: Scan [{}] remains parked: {}", scan_id, enqueue_fault);
            }
        }
    }

    // --- FASE 2: BARRIDO DE CREDENCIALES EXPIRADAS ---
    agent_repository.revoke_expired_credentials().await?;

    // --- FASE 3: TRANSICIÓN DE LIVENESS (online -> stale) ---
    let staled = agent_repository
        .mark_stale_agents(application_state.config.heartbeat_silence_seconds)
        .await?;
    if staled > 0 {
        warn!("💤 [RECONCILER]: {} agents transitioned to stale.", staled);
    }

    // --- FASE 4: HIGIENE DE CACHÉ L2 ---
    let purged = cache_repository.purge_expired().await?;
    if purged > 0 {
        info!("🧹 [RECONCILER]: Evicted {} expired L2 cache entries.", purged);
    }

    Ok(())
}
