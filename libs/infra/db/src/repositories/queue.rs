// [libs/infra/db/src/repositories/queue.rs]
/*!
 * =================================================================
 * APARATO: ENRICHMENT QUEUE REPOSITORY (V3.9 - TACTICAL LEDGER GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: COLA DURABLE MULTI-PRODUCTOR/MULTI-CONSUMIDOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DURABILITY SEAL: Una orden sobrevive al reinicio del proceso en
 *    cuanto 'enqueue' retorna éxito; vive en el mismo Ledger que la
 *    evidencia que enriquece.
 * 2. TENANT FAIRNESS: Round-robin por cursor de último despacho; un
 *    tenant saturado jamás puede matar de hambre a otro.
 * 3. AT-LEAST-ONCE: Adquisición con arrendamiento de visibilidad;
 *    los leases expirados se reclaman (recuperación de zombies) y el
 *    nack re-encola con attempts incrementado.
 * 4. LIFO PRIORITY: Dentro de un tenant los scans nuevos preceden a
 *    los viejos; los reintentos residuales ceden prioridad.
 *
 * # Mathematical Proof (Transactional Exclusivity):
 * La selección y reclamo del job ocurren dentro de una transacción
 * serializada por el motor SQL: dos workers concurrentes jamás
 * arriendan la misma orden.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use chrono::Utc;
use libsql::params;
use sentinel_domain_models::queue::{DeadLetterRecord, QueueCounters, QueueJob, TenantQueueDepth};
use sentinel_domain_models::scan::DependencyRecord;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Orden arrendada a un worker con su ventana de visibilidad.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub job: QueueJob,
    pub lease_expires_at_ms: i64,
}

/// Destino de una orden tras un reconocimiento negativo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackOutcome {
    /// Re-encolada con attempts incrementado (presupuesto restante).
    Requeued,
    /// Presupuesto agotado: aparcada en el dead-letter con su causa.
    DeadLettered,
}

pub struct QueueRepository {
    database_client: StoreClient,
}

impl QueueRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Encola una orden de enriquecimiento de forma durable.
     */
    #[instrument(skip(self, dependencies), fields(scan = %scan_id))]
    pub async fn enqueue(
        &self,
        tenant_id: &str,
        scan_id: &str,
        agent_id: &str,
        dependencies: &[DependencyRecord],
    ) -> Result<String, DbError> {
        let job_id = Uuid::new_v4().to_string();
        let payload_json = serde_json::to_string(dependencies)
            .map_err(|fault| DbError::MappingError(format!("PAYLOAD_ENCODING: {}", fault)))?;
        let now = Utc::now();

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO enrichment_queue
                    (job_id, tenant_id, scan_id, agent_id, payload_json, residual,
                     status, attempts, enqueued_at_ms, enqueued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 'queued', 0, ?6, ?7)",
                params![
                    job_id.clone(),
                    tenant_id,
                    scan_id,
                    agent_id,
                    payload_json,
                    now.timestamp_millis(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        info!("📬 [QUEUE]: Job [{}] durably enqueued for tenant [{}].", job_id, tenant_id);
        Ok(job_id)
    }

    /**
     * Adquiere la siguiente orden bajo equidad de tenants y prioridad LIFO.
     *
     * # Logic:
     * 1. Reclamación de leases expirados (zombies) de vuelta a 'queued'.
     * 2. Aparcamiento en dead-letter de órdenes con presupuesto agotado.
     * 3. Selección del tenant menos recientemente despachado con carga.
     * 4. Dentro del tenant: attempts ASC (residuales al final), LIFO.
     * 5. Arrendamiento atómico + avance del cursor de equidad.
     */
    #[instrument(skip(self))]
    pub async fn acquire_next(
        &self,
        worker_identifier: &str,
        lease_seconds: i64,
        max_attempts: u32,
    ) -> Result<Option<LeasedJob>, DbError> {
        let now_ms = Utc::now().timestamp_millis();

        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        // --- FASE 1: RECUPERACIÓN DE ESTRATOS ESTANCADOS (ZOMBIES) ---
        let reclaimed = transaction
            .execute(
                "UPDATE enrichment_queue
                 SET status = 'queued', leased_by = NULL, lease_expires_at_ms = NULL,
                     last_error = COALESCE(last_error, 'LEASE_EXPIRED_UNACKNOWLEDGED')
                 WHERE status = 'leased' AND lease_expires_at_ms < ?1",
                params![now_ms],
            )
            .await?;

        if reclaimed > 0 {
            warn!("♻️  [QUEUE_RECOVERY]: Reclaimed {} expired leases.", reclaimed);
        }

        // --- FASE 2: APARCAMIENTO DE PRESUPUESTOS AGOTADOS ---
        let mut exhausted_rows = transaction
            .query(
                "SELECT job_id, tenant_id, scan_id, agent_id, payload_json, attempts, last_error
                 FROM enrichment_queue
                 WHERE status = 'queued' AND attempts >= ?1",
                params![max_attempts as i64],
            )
            .await?;

        let mut exhausted_jobs = Vec::new();
        while let Some(row) = exhausted_rows.next().await? {
            exhausted_jobs.push((
                row.get::<String>(0)?,
                row.get::<String>(1)?,
                row.get::<String>(2)?,
                row.get::<String>(3)?,
                row.get::<String>(4)?,
                row.get::<i64>(5)?,
                row.get::<String>(6).unwrap_or_else(|_| "RETRY_BUDGET_EXHAUSTED".to_string()),
            ));
        }

        for (job_id, tenant_id, scan_id, agent_id, payload_json, attempts, last_error) in exhausted_jobs {
            transaction
                .execute(
                    "INSERT INTO enrichment_dead_letters
                        (job_id, tenant_id, scan_id, agent_id, payload_json, attempts, last_error, parked_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(job_id) DO NOTHING",
                    params![
                        job_id.clone(),
                        tenant_id,
                        scan_id,
                        agent_id,
                        payload_json,
                        attempts,
                        last_error,
                        Utc::now().to_rfc3339()
                    ],
                )
                .await?;

            transaction
                .execute("DELETE FROM enrichment_queue WHERE job_id = ?1", params![job_id.clone()])
                .await?;

            warn!("💀 [QUEUE_DEAD_LETTER]: Job [{}] parked after exhausting retry budget.", job_id);
        }

        // --- FASE 3: SELECCIÓN EQUITATIVA DE TENANT ---
        let mut tenant_rows = transaction
            .query(
                "SELECT q.tenant_id
                 FROM enrichment_queue q
                 LEFT JOIN queue_fairness f ON f.tenant_id = q.tenant_id
                 WHERE q.status = 'queued'
                 GROUP BY q.tenant_id
                 ORDER BY COALESCE(MAX(f.last_dispatched_at_ms), 0) ASC, q.tenant_id ASC
                 LIMIT 1",
                (),
            )
            .await?;

        let elected_tenant: String = match tenant_rows.next().await? {
            Some(row) => row.get(0)?,
            None => {
                transaction.commit().await.map_err(|_| DbError::TransactionError)?;
                return Ok(None);
            }
        };

        // --- FASE 4: SELECCIÓN LIFO DENTRO DEL TENANT ---
        let mut job_rows = transaction
            .query(
                "SELECT job_id, scan_id, agent_id, payload_json, residual, attempts, enqueued_at
                 FROM enrichment_queue
                 WHERE status = 'queued' AND tenant_id = ?1
                 ORDER BY attempts ASC, enqueued_at_ms DESC
                 LIMIT 1",
                params![elected_tenant.clone()],
            )
            .await?;

        let elected_row = match job_rows.next().await? {
            Some(row) => row,
            None => {
                transaction.commit().await.map_err(|_| DbError::TransactionError)?;
                return Ok(None);
            }
        };

        let job_id: String = elected_row.get(0)?;
        let scan_id: String = elected_row.get(1)?;
        let agent_id: String = elected_row.get(2)?;
        let payload_json: String = elected_row.get(3)?;
        let residual_flag: i64 = elected_row.get(4)?;
        let previous_attempts: i64 = elected_row.get(5)?;
        let enqueued_at: String = elected_row.get(6)?;

        let dependencies: Vec<DependencyRecord> = serde_json::from_str(&payload_json)
            .map_err(|fault| DbError::MappingError(format!("PAYLOAD_DECODING: {}", fault)))?;

        // --- FASE 5: ARRENDAMIENTO ATÓMICO ---
        let lease_expires_at_ms = now_ms + lease_seconds * 1000;

        transaction
            .execute(
                "UPDATE enrichment_queue
                 SET status = 'leased', leased_by = ?1, lease_expires_at_ms = ?2,
                     attempts = attempts + 1
                 WHERE job_id = ?3",
                params![worker_identifier, lease_expires_at_ms, job_id.clone()],
            )
            .await?;

        transaction
            .execute(
                "INSERT INTO queue_fairness (tenant_id, last_dispatched_at_ms)
                 VALUES (?1, ?2)
                 ON CONFLICT(tenant_id) DO UPDATE SET last_dispatched_at_ms = excluded.last_dispatched_at_ms",
                params![elected_tenant.clone(), now_ms],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        Ok(Some(LeasedJob {
            job: QueueJob {
                job_id,
                tenant_id: elected_tenant,
                scan_id,
                agent_id,
                dependencies,
                residual: residual_flag != 0,
                attempts: (previous_attempts + 1) as u32,
                enqueued_at,
            },
            lease_expires_at_ms,
        }))
    }

    /// Confirmación terminal: la orden se destruye del Ledger vivo.
    pub async fn acknowledge(&self, job_id: &str, worker_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let affected = connection
            .execute(
                "DELETE FROM enrichment_queue
                 WHERE job_id = ?1 AND leased_by = ?2 AND status = 'leased'",
                params![job_id, worker_identifier],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::LeaseOwnershipConflict);
        }
        Ok(())
    }

    /**
     * Reconocimiento negativo: re-encola el residuo o aparca la orden.
     * Cuando 'residual_dependencies' está presente, la orden re-encolada
     * transporta únicamente el residuo que falló.
     */
    #[instrument(skip(self, residual_dependencies))]
    pub async fn negative_acknowledge(
        &self,
        job_id: &str,
        worker_identifier: &str,
        error_cause: &str,
        residual_dependencies: Option<&[DependencyRecord]>,
        max_attempts: u32,
    ) -> Result<NackOutcome, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut owned_rows = transaction
            .query(
                "SELECT tenant_id, scan_id, agent_id, payload_json, attempts
                 FROM enrichment_queue
                 WHERE job_id = ?1 AND leased_by = ?2 AND status = 'leased'",
                params![job_id, worker_identifier],
            )
            .await?;

        let owned_row = match owned_rows.next().await? {
            Some(row) => row,
            None => return Err(DbError::LeaseOwnershipConflict),
        };

        let tenant_id: String = owned_row.get(0)?;
        let scan_id: String = owned_row.get(1)?;
        let agent_id: String = owned_row.get(2)?;
        let stored_payload: String = owned_row.get(3)?;
        let attempts: i64 = owned_row.get(4)?;

        let effective_payload = match residual_dependencies {
            Some(residual) => serde_json::to_string(residual)
                .map_err(|fault| DbError::MappingError(format!("PAYLOAD_ENCODING: {}", fault)))?,
            None => stored_payload,
        };

        let outcome = if attempts as u32 >= max_attempts {
            transaction
                .execute(
                    "INSERT INTO enrichment_dead_letters
                        (job_id, tenant_id, scan_id, agent_id, payload_json, attempts, last_error, parked_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(job_id) DO NOTHING",
                    params![
                        job_id,
                        tenant_id,
                        scan_id,
                        agent_id,
                        effective_payload,
                        attempts,
                        error_cause,
                        Utc::now().to_rfc3339()
                    ],
                )
                .await?;

            transaction
                .execute("DELETE FROM enrichment_queue WHERE job_id = ?1", params![job_id])
                .await?;

            warn!("💀 [QUEUE_DEAD_LETTER]: Job [{}] parked: {}", job_id, error_cause);
            NackOutcome::DeadLettered
        } else {
            transaction
                .execute(
                    "UPDATE enrichment_queue
                     SET status = 'queued', leased_by = NULL, lease_expires_at_ms = NULL,
                         last_error = ?1, payload_json = ?2, residual = ?3
                     WHERE job_id = ?4",
                    params![
                        error_cause,
                        effective_payload,
                        residual_dependencies.is_some() as i64,
                        job_id
                    ],
                )
                .await?;

            NackOutcome::Requeued
        };

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(outcome)
    }

    /**
     * Liberación sin penalización durante el drenaje de apagado.
     * La orden vuelve a la cola y será re-entregada.
     */
    pub async fn release(&self, job_id: &str, worker_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "UPDATE enrichment_queue
                 SET status = 'queued', leased_by = NULL, lease_expires_at_ms = NULL,
                     attempts = MAX(attempts - 1, 0)
                 WHERE job_id = ?1 AND leased_by = ?2 AND status = 'leased'",
                params![job_id, worker_identifier],
            )
            .await?;

        Ok(())
    }

    /// Contadores observables para el diagnóstico del operador.
    pub async fn counters(&self) -> Result<QueueCounters, DbError> {
        let connection = self.database_client.get_connection()?;
        let now_ms = Utc::now().timestamp_millis();

        let mut depth_rows = connection
            .query(
                "SELECT tenant_id, COUNT(*) FROM enrichment_queue
                 WHERE status = 'queued'
                 GROUP BY tenant_id ORDER BY tenant_id ASC",
                (),
            )
            .await?;

        let mut depth_per_tenant = Vec::new();
        while let Some(row) = depth_rows.next().await? {
            depth_per_tenant.push(TenantQueueDepth {
                tenant_id: row.get(0)?,
                depth: row.get::<i64>(1)? as u64,
            });
        }

        let mut in_flight_rows = connection
            .query("SELECT COUNT(*) FROM enrichment_queue WHERE status = 'leased'", ())
            .await?;
        let in_flight = match in_flight_rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };

        let mut dead_letter_rows = connection
            .query("SELECT COUNT(*) FROM enrichment_dead_letters", ())
            .await?;
        let dead_letter_depth = match dead_letter_rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };

        let mut oldest_rows = connection
            .query(
                "SELECT MIN(enqueued_at_ms) FROM enrichment_queue WHERE status = 'queued'",
                (),
            )
            .await?;
        let oldest_pending_age_seconds = match oldest_rows.next().await? {
            Some(row) => match row.get::<i64>(0) {
                Ok(oldest_ms) if oldest_ms > 0 => ((now_ms - oldest_ms).max(0) / 1000) as u64,
                _ => 0,
            },
            None => 0,
        };

        Ok(QueueCounters {
            depth_per_tenant,
            in_flight,
            dead_letter_depth,
            oldest_pending_age_seconds,
        })
    }

    /// Órdenes aparcadas en el dead-letter, más recientes primero.
    pub async fn fetch_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterRecord>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT job_id, tenant_id, scan_id, payload_json, attempts, last_error, parked_at
                 FROM enrichment_dead_letters
                 ORDER BY parked_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload_json: String = row.get(3)?;
            let dependencies: Vec<DependencyRecord> = serde_json::from_str(&payload_json)
                .map_err(|fault| DbError::MappingError(format!("PAYLOAD_DECODING: {}", fault)))?;

            records.push(DeadLetterRecord {
                job_id: row.get(0)?,
                tenant_id: row.get(1)?,
                scan_id: row.get(2)?,
                dependencies,
                attempts: row.get::<i64>(4)? as u32,
                last_error: row.get(5)?,
                parked_at: row.get(6)?,
            });
        }

        Ok(records)
    }

    /// Existencia de una orden viva para (tenant, scan) — usada por el
    /// reconciliador para no duplicar encolados.
    pub async fn has_live_job_for_scan(&self, tenant_id: &str, scan_id: &str) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT COUNT(*) FROM enrichment_queue WHERE tenant_id = ?1 AND scan_id = ?2",
                params![tenant_id, scan_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? > 0),
            None => Ok(false),
        }
    }
}
