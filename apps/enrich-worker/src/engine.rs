// [apps/enrich-worker/src/engine.rs]
/*!
 * =================================================================
 * APARATO: ADAPTIVE ENRICHMENT EXECUTOR (V3.7 - POOL AUTHORITY)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: DRENAJE DE COLA, SUB-LOTEO Y PERSISTENCIA ATÓMICA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. POOL DISCIPLINE: N workers de Tokio drenan la misma cola durable;
 *    la exclusividad de cada orden la garantiza el arrendamiento
 *    transaccional del Ledger.
 * 2. SUB-BATCH DEADLINES: Cada sub-lote porta su propia ventana; un
 *    upstream lento jamás consume la orden completa.
 * 3. PARTIAL DISCIPLINE: Los éxitos persisten, el residuo viaja en el
 *    nack; el dead-letter cierra el ciclo con estado visible
 *    'partial' o 'failed' en el scan.
 * 4. GRACEFUL DRAIN: Ante la señal de apagado el worker suelta los
 *    arrendamientos no confirmados; la cola re-entrega.
 * =================================================================
 */

use sentinel_domain_enrichment::cache::{ProcessCache, TieredCache};
use sentinel_domain_enrichment::engine::{EngineConfig, EnrichmentEngine};
use sentinel_domain_enrichment::metrics::EngineMetrics;
use sentinel_domain_enrichment::traits::UpstreamSource;
use sentinel_domain_models::finding::Finding;
use sentinel_domain_models::scan::{DependencyRecord, EnrichmentStatus};
use sentinel_infra_cve_client::{UpstreamClientConfig, UpstreamCveClient};
use sentinel_infra_db::repositories::{
    CveRepository, FindingRepository, LeasedJob, NackOutcome, QueueRepository, ScanRepository,
    SharedCacheRepository,
};
use sentinel_infra_db::StoreClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::budget::StoreRateBudget;
use crate::config::WorkerConfig;

/// Motor de ejecución del pool de enriquecimiento.
pub struct EnrichWorkerEngine {
    store_client: StoreClient,
    enrichment_engine: Arc<EnrichmentEngine>,
    termination_signal: Arc<AtomicBool>,
    worker_node_identifier: String,
    config: Arc<WorkerConfig>,
}

impl EnrichWorkerEngine {
    /**
     * Ensambla el motor completo: diccionario, almacén, caché L1/L2,
     * uplink upstream con presupuesto de flota y métricas.
     */
    pub fn assemble(
        store_client: StoreClient,
        config: WorkerConfig,
        termination_signal: Arc<AtomicBool>,
        worker_node_identifier: String,
    ) -> anyhow::Result<Self> {
        let dictionary = Arc::new(CveRepository::new(store_client.clone()));
        let vulnerability_store = Arc::new(CveRepository::new(store_client.clone()));
        let shared_cache = Arc::new(SharedCacheRepository::new(store_client.clone()));

        let tiered_cache = TieredCache::new(
            ProcessCache::new(config.l1_capacity, Duration::from_secs(config.cache_l1_ttl_seconds)),
            shared_cache,
            Duration::from_secs(config.cache_l2_ttl_seconds),
        );

        // --- UPLINK UPSTREAM (OPCIONAL: SIN ENDPOINT SE OPERA LOCAL) ---
        let mut upstream_sources: Vec<Arc<dyn UpstreamSource>> = Vec::new();

        if let Some(upstream_endpoint) = &config.upstream_cve_endpoint {
            let fleet_budget = Arc::new(StoreRateBudget::new(
                store_client.clone(),
                config.upstream_burst,
                config.upstream_rate_per_second,
            ));

            let uplink = UpstreamCveClient::new(
                UpstreamClientConfig::new(
                    "primary-cve-source",
                    upstream_endpoint,
                    config.upstream_cve_api_key.clone(),
                ),
                fleet_budget,
            )
            .map_err(|uplink_fault| anyhow::anyhow!("UPLINK_IGNITION_FAULT: {}", uplink_fault))?;

            upstream_sources.push(Arc::new(uplink));
        } else {
            warn!("📡 [EXECUTOR]: No upstream endpoint configured; serving local knowledge only.");
        }

        let enrichment_engine = Arc::new(EnrichmentEngine::new(
            dictionary,
            vulnerability_store,
            upstream_sources,
            tiered_cache,
            Arc::new(EngineMetrics::default()),
            EngineConfig {
                candidate_limit: config.candidate_limit,
                similarity_threshold: config.similarity_threshold,
                freshness_ttl: Duration::from_secs(config.cve_freshness_ttl_seconds),
            },
        ));

        Ok(Self {
            store_client,
            enrichment_engine,
            termination_signal,
            worker_node_identifier,
            config: Arc::new(config),
        })
    }

    /**
     * Ignición del pool: N bucles de worker drenando la cola durable.
     * Bloquea hasta que todos los workers sellen su apagado.
     */
    pub async fn ignite_pipeline_operations(self: Arc<Self>) {
        let pool_size = self.config.worker_pool_size.max(1);
        info!("🏭 [EXECUTOR]: Igniting worker pool (size={}).", pool_size);

        let mut worker_handles = Vec::with_capacity(pool_size);

        for worker_index in 0..pool_size {
            let engine_reference = Arc::clone(&self);
            worker_handles.push(tokio::spawn(async move {
                engine_reference.worker_loop(worker_index).await;
            }));
        }

        for handle in worker_handles {
            if let Err(join_fault) = handle.await {
                error!("💀 [EXECUTOR]: Worker task collapsed: {}", join_fault);
            }
        }

        info!("🏁 [EXECUTOR]: Worker pool drained. Shutdown sealed.");
    }

    /**
     * Drenaje de un único paso: adquiere y procesa a lo sumo una orden.
     * Retorna true si una orden fue procesada. Vía de ejecución para
     * invocaciones puntuales (cron de mantenimiento, Proving Grounds).
     */
    pub async fn drain_single_job(&self, worker_tag: &str) -> anyhow::Result<bool> {
        let queue_repository = QueueRepository::new(self.store_client.clone());

        match queue_repository
            .acquire_next(
                worker_tag,
                self.config.queue_lease_seconds,
                self.config.max_queue_attempts,
            )
            .await
            .map_err(|acquisition_fault| anyhow::anyhow!("ACQUISITION_FAULT: {}", acquisition_fault))?
        {
            Some(leased_job) => {
                self.process_leased_job(worker_tag, &queue_repository, leased_job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Bucle de vida de un worker individual del pool.
    async fn worker_loop(&self, worker_index: usize) {
        let worker_tag = format!("{}#{}", self.worker_node_identifier, worker_index);
        let queue_repository = QueueRepository::new(self.store_client.clone());

        info!("⚙️  [WORKER:{}]: Operational.", worker_tag);

        while !self.termination_signal.load(Ordering::SeqCst) {
            let acquisition = queue_repository
                .acquire_next(
                    &worker_tag,
                    self.config.queue_lease_seconds,
                    self.config.max_queue_attempts,
                )
                .await;

            match acquisition {
                Ok(Some(leased_job)) => {
                    self.process_leased_job(&worker_tag, &queue_repository, leased_job)
                        .await;
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
                Err(acquisition_fault) => {
                    warn!("⚠️ [WORKER:{}]: Acquisition fault: {}", worker_tag, acquisition_fault);
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
            }
        }

        info!("🛑 [WORKER:{}]: Termination signal honored.", worker_tag);
    }

    /**
     * Procesa una orden arrendada: sub-loteo, persistencia y veredicto.
     */
    #[instrument(skip(self, queue_repository, leased_job), fields(worker = %worker_tag, scan = %leased_job.job.scan_id))]
    async fn process_leased_job(
        &self,
        worker_tag: &str,
        queue_repository: &QueueRepository,
        leased_job: LeasedJob,
    ) {
        let job = leased_job.job;
        let scan_repository = ScanRepository::new(self.store_client.clone());
        let finding_repository = FindingRepository::new(self.store_client.clone());

        let sub_batch_window = Duration::from_secs(self.config.sub_batch_deadline_seconds);
        let batch_size = self.config.batch_size.max(1);

        let mut harvested_findings: Vec<Finding> = Vec::new();
        let mut residual_dependencies: Vec<DependencyRecord> = Vec::new();
        let mut last_failure_cause = String::new();

        // --- FASE 1: SUB-LOTEO BAJO VENTANAS INDEPENDIENTES ---
        for sub_batch in job.dependencies.chunks(batch_size) {
            // Drenaje ordenado: soltamos el arrendamiento y la cola re-entrega.
            if self.termination_signal.load(Ordering::SeqCst) {
                warn!("🕊️ [WORKER:{}]: Releasing lease on [{}] for graceful drain.", worker_tag, job.job_id);
                if let Err(release_fault) = queue_repository.release(&job.job_id, worker_tag).await {
                    warn!("⚠️ [WORKER:{}]: Release fault: {}", worker_tag, release_fault);
                }
                return;
            }

            let batch_outcome = self
                .enrichment_engine
                .enrich_batch(&job.tenant_id, &job.agent_id, &job.scan_id, sub_batch, sub_batch_window)
                .await;

            harvested_findings.extend(batch_outcome.findings);

            for batch_failure in batch_outcome.failures {
                last_failure_cause = batch_failure.error;
                residual_dependencies.push(batch_failure.dependency);
            }
        }

        // --- FASE 2: PERSISTENCIA ATÓMICA DE ÉXITOS ---
        let persistence_result = if job.residual {
            finding_repository
                .append_findings_for_scan(&job.tenant_id, &job.scan_id, &harvested_findings)
                .await
        } else {
            finding_repository
                .replace_findings_for_scan(&job.tenant_id, &job.scan_id, &harvested_findings)
                .await
        };

        if let Err(persistence_fault) = persistence_result {
            // Nada persistió: el nack re-entrega la orden completa.
            error!("💾 [WORKER:{}]: Persistence collapsed: {}", worker_tag, persistence_fault);

            let _ = queue_repository
                .negative_acknowledge(
                    &job.job_id,
                    worker_tag,
                    &format!("PERSISTENCE_FAULT: {}", persistence_fault),
                    None,
                    self.config.max_queue_attempts,
                )
                .await;
            return;
        }

        // --- FASE 3: VEREDICTO Y ESTADO VISIBLE ---
        if residual_dependencies.is_empty() {
            if let Err(status_fault) = scan_repository
                .set_enrichment_status(&job.tenant_id, &job.scan_id, &EnrichmentStatus::Enriched, None)
                .await
            {
                warn!("⚠️ [WORKER:{}]: Status transition fault: {}", worker_tag, status_fault);
            }

            match queue_repository.acknowledge(&job.job_id, worker_tag).await {
                Ok(_) => info!(
                    "✅ [WORKER:{}]: Scan [{}] enriched ({} findings).",
                    worker_tag,
                    job.scan_id,
                    harvested_findings.len()
                ),
                Err(acknowledge_fault) => {
                    warn!("⚠️ [WORKER:{}]: Acknowledge fault: {}", worker_tag, acknowledge_fault)
                }
            }
            return;
        }

        // Éxitos escritos; el residuo reintenta con prioridad degradada.
        let nack_verdict = queue_repository
            .negative_acknowledge(
                &job.job_id,
                worker_tag,
                &last_failure_cause,
                Some(&residual_dependencies),
                self.config.max_queue_attempts,
            )
            .await;

        let visible_status = match nack_verdict {
            Ok(NackOutcome::Requeued) => EnrichmentStatus::Partial,
            Ok(NackOutcome::DeadLettered) => {
                // Con evidencia parcial el scan queda 'partial'; sin ninguna, 'failed'.
                let persisted_count = finding_repository
                    .count_findings_for_scan(&job.tenant_id, &job.scan_id)
                    .await
                    .unwrap_or(0);

                if persisted_count > 0 {
                    EnrichmentStatus::Partial
                } else {
                    EnrichmentStatus::Failed
                }
            }
            Err(nack_fault) => {
                warn!("⚠️ [WORKER:{}]: Negative acknowledge fault: {}", worker_tag, nack_fault);
                EnrichmentStatus::Partial
            }
        };

        if let Err(status_fault) = scan_repository
            .set_enrichment_status(
                &job.tenant_id,
                &job.scan_id,
                &visible_status,
                Some(&last_failure_cause),
            )
            .await
        {
            warn!("⚠️ [WORKER:{}]: Status transition fault: {}", worker_tag, status_fault);
        }

        warn!(
            "🌗 [WORKER:{}]: Scan [{}] partial ({} findings, {} residual deps).",
            worker_tag,
            job.scan_id,
            harvested_findings.len(),
            residual_dependencies.len()
        );
    }
}
