// [libs/infra/db/src/repositories/scan.rs]
/*!
 * =================================================================
 * APARATO: SCAN EVIDENCE REPOSITORY (V3.6 - IDEMPOTENT LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA INMUTABLE DE SCANS Y DEPENDENCIAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONTENT-SEALED IDEMPOTENCY: La inserción se deduplica por
 *    (tenant, scan_id); un duplicado con el mismo digest es aceptación
 *    idempotente, con digest distinto es conflicto.
 * 2. NO SILENT DROP: Un scan cuya orden de cola no pudo cristalizar
 *    queda aparcado en 'awaiting-enrichment' para el reconciliador.
 * 3. COMPARABLE SCAN IDS: 'accepted_at' sella el orden de aceptación;
 *    el scan más reciente por agente es el autoritativo.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use chrono::Utc;
use libsql::params;
use sentinel_domain_models::scan::{DependencyRecord, EnrichmentStatus, ScanResultRecord, ScanSubmission};
use tracing::{info, instrument};

/// Veredicto de la inserción idempotente de un scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInsertVerdict {
    /// Primer arribo: el scan y sus dependencias cristalizaron.
    Inserted,
    /// Mismo (tenant, scan_id) y mismo digest: aceptación idempotente.
    DuplicateIdentical,
    /// Mismo (tenant, scan_id) con contenido distinto: conflicto.
    DuplicateConflicting,
}

pub struct ScanRepository {
    database_client: StoreClient,
}

impl ScanRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Inserción idempotente del scan y sus dependencias en una única
     * secuencia transaccional.
     */
    #[instrument(skip(self, submission), fields(scan = %submission.scan_id))]
    pub async fn insert_scan(
        &self,
        tenant_id: &str,
        agent_id: &str,
        submission: &ScanSubmission,
        content_digest: &str,
    ) -> Result<ScanInsertVerdict, DbError> {
        let connection = self.database_client.get_connection()?;

        // --- FASE 1: DETECCIÓN DE DUPLICADOS SELLADOS ---
        let mut existing_rows = connection
            .query(
                "SELECT dependency_digest FROM scans WHERE tenant_id = ?1 AND scan_id = ?2",
                params![tenant_id, submission.scan_id.clone()],
            )
            .await?;

        if let Some(existing_row) = existing_rows.next().await? {
            let stored_digest: String = existing_row.get(0)?;

            return if stored_digest == content_digest {
                Ok(ScanInsertVerdict::DuplicateIdentical)
            } else {
                Ok(ScanInsertVerdict::DuplicateConflicting)
            };
        }

        // --- FASE 2: CRISTALIZACIÓN TRANSACCIONAL ---
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        transaction
            .execute(
                "INSERT INTO scans
                    (tenant_id, scan_id, agent_id, started_at, completed_at,
                     enrichment_status, dependency_digest, dependency_count, accepted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8)",
                params![
                    tenant_id,
                    submission.scan_id.clone(),
                    agent_id,
                    submission.started_at.to_rfc3339(),
                    submission.completed_at.to_rfc3339(),
                    content_digest,
                    submission.dependencies.len() as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        for (ordinal, dependency) in submission.dependencies.iter().enumerate() {
            transaction
                .execute(
                    "INSERT INTO scan_dependencies
                        (tenant_id, scan_id, ordinal, name, version, dependency_type, vendor, location)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        tenant_id,
                        submission.scan_id.clone(),
                        ordinal as i64,
                        dependency.name.clone(),
                        dependency.version.clone(),
                        dependency.dependency_type.clone(),
                        dependency.vendor.clone(),
                        dependency.location.clone()
                    ],
                )
                .await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!(
            "📦 [SCAN_LEDGER]: Scan [{}] sealed with {} dependencies for tenant [{}].",
            submission.scan_id,
            submission.dependencies.len(),
            tenant_id
        );

        Ok(ScanInsertVerdict::Inserted)
    }

    /// Transición del ciclo de vida de enriquecimiento del scan.
    pub async fn set_enrichment_status(
        &self,
        tenant_id: &str,
        scan_id: &str,
        status: &EnrichmentStatus,
        last_error: Option<&str>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let affected = connection
            .execute(
                "UPDATE scans SET enrichment_status = ?1, last_error = ?2
                 WHERE tenant_id = ?3 AND scan_id = ?4",
                params![status.as_str(), last_error, tenant_id, scan_id],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn fetch_scan(
        &self,
        tenant_id: &str,
        scan_id: &str,
    ) -> Result<Option<ScanResultRecord>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT scan_id, agent_id, tenant_id, started_at, completed_at,
                        enrichment_status, dependency_digest, dependency_count, accepted_at
                 FROM scans WHERE tenant_id = ?1 AND scan_id = ?2",
                params![tenant_id, scan_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Dependencias observadas de un scan, en su orden de reporte.
    pub async fn fetch_scan_dependencies(
        &self,
        tenant_id: &str,
        scan_id: &str,
    ) -> Result<Vec<DependencyRecord>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT name, version, dependency_type, vendor, location
                 FROM scan_dependencies
                 WHERE tenant_id = ?1 AND scan_id = ?2
                 ORDER BY ordinal ASC",
                params![tenant_id, scan_id],
            )
            .await?;

        let mut dependencies = Vec::new();
        while let Some(row) = rows.next().await? {
            dependencies.push(DependencyRecord {
                name: row.get(0)?,
                version: row.get::<String>(1).ok(),
                dependency_type: row.get(2)?,
                vendor: row.get::<String>(3).ok(),
                location: row.get::<String>(4).ok(),
            });
        }

        Ok(dependencies)
    }

    /// Identificador del scan autoritativo (más reciente) de un agente.
    pub async fn fetch_latest_scan_id(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<Option<String>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT scan_id FROM scans
                 WHERE tenant_id = ?1 AND agent_id = ?2
                 ORDER BY accepted_at DESC LIMIT 1",
                params![tenant_id, agent_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Scans aparcados por fallo de encolado, para el reconciliador.
    pub async fn fetch_scans_awaiting_enrichment(
        &self,
        batch_limit: usize,
    ) -> Result<Vec<(String, String, String)>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT tenant_id, scan_id, agent_id FROM scans
                 WHERE enrichment_status = 'awaiting-enrichment'
                 ORDER BY accepted_at ASC
                 LIMIT ?1",
                params![batch_limit as i64],
            )
            .await?;

        let mut parked_scans = Vec::new();
        while let Some(row) = rows.next().await? {
            parked_scans.push((row.get(0)?, row.get(1)?, row.get(2)?));
        }

        Ok(parked_scans)
    }

    fn map_row_to_record(row: &libsql::Row) -> Result<ScanResultRecord, DbError> {
        let status_raw: String = row.get(5)?;
        let started_raw: String = row.get(3)?;
        let completed_raw: String = row.get(4)?;
        let accepted_raw: String = row.get(8)?;

        let parse_stamp = |raw: &str| {
            raw.parse()
                .map_err(|fault| DbError::MappingError(format!("SCAN_TIMESTAMP: {}", fault)))
        };

        Ok(ScanResultRecord {
            scan_id: row.get(0)?,
            agent_id: row.get(1)?,
            tenant_id: row.get(2)?,
            started_at: parse_stamp(&started_raw)?,
            completed_at: parse_stamp(&completed_raw)?,
            enrichment_status: EnrichmentStatus::parse(&status_raw)
                .ok_or_else(|| DbError::MappingError(format!("SCAN_STATUS_DRIFT: {}", status_raw)))?,
            dependency_digest: row.get(6)?,
            dependency_count: row.get::<i64>(7)? as u32,
            accepted_at: parse_stamp(&accepted_raw)?,
        })
    }
}
