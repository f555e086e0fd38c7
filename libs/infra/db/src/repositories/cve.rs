// [libs/infra/db/src/repositories/cve.rs]
/*!
 * =================================================================
 * APARATO: CVE KNOWLEDGE REPOSITORY (V3.8 - EXTERNALIZED DICTIONARY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONOCIMIENTO CVE COMPARTIDO Y DICCIONARIO DE COMPONENTES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NO MEMORY CORPUS: El diccionario de componentes vive en el Ledger
 *    y se consulta por coincidencia exacta o generación de candidatos;
 *    el motor jamás exige un corpus residente en RAM.
 * 2. MODIFIED-AT AUTHORITY: La persistencia de registros upstream
 *    compara 'modified_at'; ante desacuerdo gana el más reciente y el
 *    registro se sobreescribe, jamás se bifurca.
 * 3. SHARED REFERENCE: Ninguna tabla de este aparato porta tenant_id.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use sentinel_domain_enrichment::errors::EnrichmentError;
use sentinel_domain_enrichment::normalize::NormalizedTuple;
use sentinel_domain_enrichment::traits::{ComponentDictionary, VulnerabilityStore};
use sentinel_domain_models::cve::{ComponentIdentifier, CveRecord};
use tracing::{debug, instrument};

pub struct CveRepository {
    database_client: StoreClient,
}

impl CveRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /// Siembra una entrada del diccionario oficial de componentes.
    pub async fn insert_dictionary_entry(
        &self,
        vendor: &str,
        product: &str,
        version: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "INSERT INTO component_dictionary (vendor, product, version)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(vendor, product, version) DO NOTHING",
                params![vendor, product, version],
            )
            .await?;

        Ok(())
    }

    /**
     * Persistencia idempotente de registros CVE con política modified-at.
     */
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert_cve_records(&self, records: &[CveRecord]) -> Result<usize, DbError> {
        if records.is_empty() {
            return Ok(0);
        }

        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut persisted_count = 0usize;

        for record in records {
            // --- POLÍTICA DE AUTORIDAD: EL MODIFIED-AT MÁS RECIENTE GANA ---
            let mut existing_rows = transaction
                .query(
                    "SELECT modified_at FROM cve_records WHERE cve_id = ?1",
                    params![record.cve_id.clone()],
                )
                .await?;

            if let Some(existing_row) = existing_rows.next().await? {
                let stored_modified_raw: String = existing_row.get(0)?;
                if stored_modified_raw >= record.modified_at.to_rfc3339() {
                    debug!("🗿 [CVE_KNOWLEDGE]: Record [{}] already authoritative; skipping.", record.cve_id);
                    continue;
                }
            }

            transaction
                .execute(
                    "INSERT INTO cve_records
                        (cve_id, description, severity, cvss_score, published_at, modified_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(cve_id) DO UPDATE SET
                         description = excluded.description,
                         severity = excluded.severity,
                         cvss_score = excluded.cvss_score,
                         published_at = excluded.published_at,
                         modified_at = excluded.modified_at",
                    params![
                        record.cve_id.clone(),
                        record.description.clone(),
                        record.severity.clone(),
                        record.cvss_score,
                        record.published_at.to_rfc3339(),
                        record.modified_at.to_rfc3339()
                    ],
                )
                .await?;

            // El conjunto de componentes afectados se reemplaza por completo.
            transaction
                .execute(
                    "DELETE FROM cve_affected_components WHERE cve_id = ?1",
                    params![record.cve_id.clone()],
                )
                .await?;

            for component_canonical in &record.affected_components {
                transaction
                    .execute(
                        "INSERT INTO cve_affected_components (cve_id, component_canonical)
                         VALUES (?1, ?2)
                         ON CONFLICT(cve_id, component_canonical) DO NOTHING",
                        params![record.cve_id.clone(), component_canonical.clone()],
                    )
                    .await?;
            }

            persisted_count += 1;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(persisted_count)
    }

    /// CVEs cuyo conjunto de afectación contiene al componente.
    pub async fn fetch_cves_for_component(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Vec<CveRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let canonical = component.canonical_form();

        let mut rows = connection
            .query(
                "SELECT r.cve_id, r.description, r.severity, r.cvss_score, r.published_at, r.modified_at
                 FROM cve_records r
                 JOIN cve_affected_components a ON a.cve_id = r.cve_id
                 WHERE a.component_canonical = ?1
                 ORDER BY r.cve_id ASC",
                params![canonical],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let cve_id: String = row.get(0)?;
            let published_raw: String = row.get(4)?;
            let modified_raw: String = row.get(5)?;

            let affected_components = self.fetch_affected_components(&cve_id).await?;

            records.push(CveRecord {
                cve_id,
                description: row.get(1)?,
                severity: row.get(2)?,
                cvss_score: row.get(3)?,
                published_at: published_raw
                    .parse()
                    .map_err(|fault| DbError::MappingError(format!("CVE_TIMESTAMP: {}", fault)))?,
                modified_at: modified_raw
                    .parse()
                    .map_err(|fault| DbError::MappingError(format!("CVE_TIMESTAMP: {}", fault)))?,
                affected_components,
            });
        }

        Ok(records)
    }

    async fn fetch_affected_components(&self, cve_id: &str) -> Result<Vec<String>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT component_canonical FROM cve_affected_components
                 WHERE cve_id = ?1 ORDER BY component_canonical ASC",
                params![cve_id],
            )
            .await?;

        let mut components = Vec::new();
        while let Some(row) = rows.next().await? {
            components.push(row.get(0)?);
        }
        Ok(components)
    }

    async fn dictionary_exact(
        &self,
        tuple: &NormalizedTuple,
    ) -> Result<Vec<ComponentIdentifier>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = match &tuple.vendor {
            Some(vendor) => {
                connection
                    .query(
                        "SELECT vendor, product, version FROM component_dictionary
                         WHERE vendor = ?1 AND product = ?2 AND version = ?3",
                        params![vendor.clone(), tuple.name.clone(), tuple.version.clone()],
                    )
                    .await?
            }
            None => {
                connection
                    .query(
                        "SELECT vendor, product, version FROM component_dictionary
                         WHERE product = ?1 AND version = ?2",
                        params![tuple.name.clone(), tuple.version.clone()],
                    )
                    .await?
            }
        };

        let mut identifiers = Vec::new();
        while let Some(row) = rows.next().await? {
            let vendor: String = row.get(0)?;
            let product: String = row.get(1)?;
            let version: String = row.get(2)?;
            identifiers.push(ComponentIdentifier::new(&vendor, &product, &version));
        }

        Ok(identifiers)
    }

    /// Generador de candidatos por fragmentos léxicos del producto.
    async fn dictionary_candidates(
        &self,
        product_hint: &str,
        limit: usize,
    ) -> Result<Vec<ComponentIdentifier>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut candidates: Vec<ComponentIdentifier> = Vec::new();

        let hint_tokens: Vec<String> = product_hint
            .split(|character: char| !character.is_ascii_alphanumeric())
            .filter(|token| token.len() >= 2)
            .take(4)
            .map(|token| token.to_lowercase())
            .collect();

        for token in hint_tokens {
            if candidates.len() >= limit {
                break;
            }

            let like_pattern = format!("%{}%", token);
            let mut rows = connection
                .query(
                    "SELECT DISTINCT vendor, product FROM component_dictionary
                     WHERE product LIKE ?1 OR vendor LIKE ?1
                     LIMIT ?2",
                    params![like_pattern, limit as i64],
                )
                .await?;

            while let Some(row) = rows.next().await? {
                let vendor: String = row.get(0)?;
                let product: String = row.get(1)?;
                let candidate = ComponentIdentifier::new(&vendor, &product, "");

                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                    if candidates.len() >= limit {
                        break;
                    }
                }
            }
        }

        Ok(candidates)
    }

    pub async fn mark_refreshed(
        &self,
        component: &ComponentIdentifier,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "INSERT INTO component_refresh (component_canonical, refreshed_at)
                 VALUES (?1, ?2)
                 ON CONFLICT(component_canonical) DO UPDATE SET refreshed_at = excluded.refreshed_at",
                params![component.canonical_form(), refreshed_at.to_rfc3339()],
            )
            .await?;

        Ok(())
    }

    pub async fn fetch_refreshed_at(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT refreshed_at FROM component_refresh WHERE component_canonical = ?1",
                params![component.canonical_form()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let refreshed_raw: String = row.get(0)?;
                Ok(Some(refreshed_raw.parse().map_err(|fault| {
                    DbError::MappingError(format!("REFRESH_TIMESTAMP: {}", fault))
                })?))
            }
            None => Ok(None),
        }
    }
}

// --- IMPLEMENTACIÓN DE COSTURAS DEL MOTOR (ESTRATO L2 -> L3) ---

#[async_trait]
impl ComponentDictionary for CveRepository {
    async fn exact_lookup(
        &self,
        tuple: &NormalizedTuple,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError> {
        self.dictionary_exact(tuple)
            .await
            .map_err(|fault| EnrichmentError::Dictionary(fault.to_string()))
    }

    async fn candidate_lookup(
        &self,
        product_hint: &str,
        limit: usize,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError> {
        self.dictionary_candidates(product_hint, limit)
            .await
            .map_err(|fault| EnrichmentError::Dictionary(fault.to_string()))
    }
}

#[async_trait]
impl VulnerabilityStore for CveRepository {
    async fn cves_for_component(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Vec<CveRecord>, EnrichmentError> {
        self.fetch_cves_for_component(component)
            .await
            .map_err(|fault| EnrichmentError::Store(fault.to_string()))
    }

    async fn persist_cve_records(&self, records: &[CveRecord]) -> Result<(), EnrichmentError> {
        self.upsert_cve_records(records)
            .await
            .map(|_| ())
            .map_err(|fault| EnrichmentError::Store(fault.to_string()))
    }

    async fn component_refreshed_at(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Option<DateTime<Utc>>, EnrichmentError> {
        self.fetch_refreshed_at(component)
            .await
            .map_err(|fault| EnrichmentError::Store(fault.to_string()))
    }

    async fn mark_component_refreshed(
        &self,
        component: &ComponentIdentifier,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), EnrichmentError> {
        self.mark_refreshed(component, refreshed_at)
            .await
            .map_err(|fault| EnrichmentError::Store(fault.to_string()))
    }
}
