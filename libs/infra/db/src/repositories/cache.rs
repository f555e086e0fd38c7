// [libs/infra/db/src/repositories/cache.rs]
/*!
 * =================================================================
 * APARATO: SHARED CACHE REPOSITORY (V3.2 - L2 STRATUM)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CACHÉ L2 COMPARTIDA ENTRE PROCESOS DE ENRIQUECIMIENTO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPACT ENCODING: Los veredictos se cristalizan como tramas
 *    MessagePack (rmp-serde), reduciendo el peso del Ledger frente a
 *    JSON plano.
 * 2. IDEMPOTENT WRITERS: El upsert tolera escritores concurrentes;
 *    el último veredicto escrito es equivalente a cualquier otro para
 *    instantáneas idénticas de conocimiento.
 * 3. TTL DISCIPLINE: Las entradas expiradas son invisibles al lector
 *    y purgables por el daemon de higiene.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use async_trait::async_trait;
use chrono::Utc;
use libsql::params;
use sentinel_domain_enrichment::cache::{CacheKey, CachedVerdict};
use sentinel_domain_enrichment::errors::EnrichmentError;
use sentinel_domain_enrichment::traits::SharedCache;
use std::time::Duration;
use tracing::instrument;

pub struct SharedCacheRepository {
    database_client: StoreClient,
}

impl SharedCacheRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    async fn fetch_verdict(&self, key: &CacheKey) -> Result<Option<CachedVerdict>, DbError> {
        let now_ms = Utc::now().timestamp_millis();

        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT verdict_blob FROM enrichment_cache
                 WHERE cache_key = ?1 AND expires_at_ms > ?2",
                params![key.storage_form(), now_ms],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let verdict_blob: Vec<u8> = row.get(0)?;
                let verdict: CachedVerdict = rmp_serde::from_slice(&verdict_blob)
                    .map_err(|fault| DbError::MappingError(format!("CACHE_DECODING: {}", fault)))?;
                Ok(Some(verdict))
            }
            None => Ok(None),
        }
    }

    async fn store_verdict(
        &self,
        key: &CacheKey,
        verdict: &CachedVerdict,
        time_to_live: Duration,
    ) -> Result<(), DbError> {
        let verdict_blob = rmp_serde::to_vec(verdict)
            .map_err(|fault| DbError::MappingError(format!("CACHE_ENCODING: {}", fault)))?;

        let now_ms = Utc::now().timestamp_millis();
        let expires_at_ms = now_ms + time_to_live.as_millis() as i64;

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO enrichment_cache (cache_key, verdict_blob, stored_at_ms, expires_at_ms)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(cache_key) DO UPDATE SET
                     verdict_blob = excluded.verdict_blob,
                     stored_at_ms = excluded.stored_at_ms,
                     expires_at_ms = excluded.expires_at_ms",
                params![key.storage_form(), verdict_blob, now_ms, expires_at_ms],
            )
            .await?;

        Ok(())
    }

    /// Purga de higiene: elimina entradas expiradas del estrato L2.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64, DbError> {
        let now_ms = Utc::now().timestamp_millis();

        let connection = self.database_client.get_connection()?;
        let purged = connection
            .execute(
                "DELETE FROM enrichment_cache WHERE expires_at_ms <= ?1",
                params![now_ms],
            )
            .await?;

        Ok(purged)
    }
}

// --- IMPLEMENTACIÓN DE LA COSTURA L2 DEL MOTOR ---

#[async_trait]
impl SharedCache for SharedCacheRepository {
    async fn fetch(&self, key: &CacheKey) -> Result<Option<CachedVerdict>, EnrichmentError> {
        self.fetch_verdict(key)
            .await
            .map_err(|fault| EnrichmentError::Cache(fault.to_string()))
    }

    async fn store(
        &self,
        key: &CacheKey,
        verdict: &CachedVerdict,
        time_to_live: Duration,
    ) -> Result<(), EnrichmentError> {
        self.store_verdict(key, verdict, time_to_live)
            .await
            .map_err(|fault| EnrichmentError::Cache(fault.to_string()))
    }
}
