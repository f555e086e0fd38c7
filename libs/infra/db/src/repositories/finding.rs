// [libs/infra/db/src/repositories/finding.rs]
/*!
 * =================================================================
 * APARATO: FINDING REPOSITORY (V3.7 - ATOMIC REPLACE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA Y RASTREO DE HALLAZGOS CVE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ATOMIC REPLACE: El re-enriquecimiento de un scan borra e inserta
 *    dentro de una transacción; hallazgos viejos y nuevos jamás son
 *    observables de forma simultánea.
 * 2. RESIDUAL APPEND: Los reintentos residuales agregan hallazgos del
 *    residuo sin tocar los éxitos ya persistidos.
 * 3. TENANT SCOPE: Toda consulta exige tenant_id; no existe lectura
 *    cruzada entre tenants.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use libsql::params;
use sentinel_domain_models::finding::{Finding, FindingPriority};
use tracing::{info, instrument};

pub struct FindingRepository {
    database_client: StoreClient,
}

impl FindingRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Reemplazo atómico del conjunto de hallazgos de un scan.
     *
     * # Mathematical Proof (Atomic Visibility):
     * DELETE + INSERT comprometidos en una única transacción: un lector
     * observa el conjunto previo completo o el nuevo completo, nunca
     * una mezcla parcial.
     */
    #[instrument(skip(self, findings), fields(scan = %scan_id, count = findings.len()))]
    pub async fn replace_findings_for_scan(
        &self,
        tenant_id: &str,
        scan_id: &str,
        findings: &[Finding],
    ) -> Result<usize, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        transaction
            .execute(
                "DELETE FROM findings WHERE tenant_id = ?1 AND scan_id = ?2",
                params![tenant_id, scan_id],
            )
            .await?;

        Self::insert_batch(&transaction, findings).await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!("💾 [FINDING_REPO]: Scan [{}] now carries {} findings.", scan_id, findings.len());
        Ok(findings.len())
    }

    /**
     * Inserción transaccional del residuo de un reintento parcial.
     * Los hallazgos ya persistidos del scan permanecen intactos.
     */
    #[instrument(skip(self, findings), fields(scan = %scan_id))]
    pub async fn append_findings_for_scan(
        &self,
        _tenant_id: &str,
        scan_id: &str,
        findings: &[Finding],
    ) -> Result<usize, DbError> {
        if findings.is_empty() {
            return Ok(0);
        }

        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        Self::insert_batch(&transaction, findings).await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(findings.len())
    }

    async fn insert_batch(
        transaction: &libsql::Transaction,
        findings: &[Finding],
    ) -> Result<(), DbError> {
        let sql = r#"
            INSERT INTO findings (
                finding_id, tenant_id, agent_id, scan_id,
                dependency_name, dependency_version, component_identifier,
                cve_id, priority, detected_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(finding_id) DO NOTHING
        "#;

        for finding in findings {
            transaction
                .execute(sql, params![
                    finding.finding_id.clone(),
                    finding.tenant_id.clone(),
                    finding.agent_id.clone(),
                    finding.scan_id.clone(),
                    finding.dependency_name.clone(),
                    finding.dependency_version.clone(),
                    finding.component_identifier.clone(),
                    finding.cve_id.clone(),
                    finding.priority.as_str(),
                    finding.detected_at.clone()
                ])
                .await?;
        }

        Ok(())
    }

    /// Hallazgos de un scan concreto, sellados por (dependencia, cve).
    pub async fn fetch_findings_for_scan(
        &self,
        tenant_id: &str,
        scan_id: &str,
    ) -> Result<Vec<Finding>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT finding_id, tenant_id, agent_id, scan_id, dependency_name,
                        dependency_version, component_identifier, cve_id, priority, detected_at
                 FROM findings
                 WHERE tenant_id = ?1 AND scan_id = ?2
                 ORDER BY dependency_name ASC, cve_id ASC",
                params![tenant_id, scan_id],
            )
            .await?;

        let mut findings = Vec::new();
        while let Some(row) = rows.next().await? {
            let priority_raw: String = row.get(8)?;

            findings.push(Finding {
                finding_id: row.get(0)?,
                tenant_id: row.get(1)?,
                agent_id: row.get(2)?,
                scan_id: row.get(3)?,
                dependency_name: row.get(4)?,
                dependency_version: row.get(5)?,
                component_identifier: row.get(6)?,
                cve_id: row.get(7)?,
                priority: FindingPriority::parse(&priority_raw)
                    .ok_or_else(|| DbError::MappingError(format!("PRIORITY_DRIFT: {}", priority_raw)))?,
                detected_at: row.get(9)?,
            });
        }

        Ok(findings)
    }

    pub async fn count_findings_for_scan(
        &self,
        tenant_id: &str,
        scan_id: &str,
    ) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT COUNT(*) FROM findings WHERE tenant_id = ?1 AND scan_id = ?2",
                params![tenant_id, scan_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Conteo total de hallazgos visibles para un tenant (aislamiento).
    pub async fn count_findings_for_tenant(&self, tenant_id: &str) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT COUNT(*) FROM findings WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }
}
