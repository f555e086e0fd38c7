// [libs/infra/db/src/repositories/rate_limit.rs]
/*!
 * =================================================================
 * APARATO: UPSTREAM RATE BUDGET REPOSITORY (V3.3 - GLOBAL GOVERNOR)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TOKEN BUCKET GLOBAL POR FUENTE UPSTREAM
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FLEET-WIDE BUDGET: El estado del bucket vive en el Ledger
 *    compartido; escalar el número de workers jamás excede el contrato
 *    documentado de la fuente upstream.
 * 2. ATOMIC TAKE: Recarga y débito ocurren dentro de una transacción;
 *    dos workers concurrentes jamás gastan el mismo token.
 *
 * # Mathematical Proof (Sliding Window Safety):
 * tokens(t) = min(capacity, tokens(t0) + (t - t0) * refill). El débito
 * solo procede si tokens >= 1, por lo que el gasto agregado en
 * cualquier ventana W está acotado por capacity + refill * W.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use chrono::Utc;
use libsql::params;
use tracing::instrument;

/// Veredicto del presupuesto global de tasa.
#[derive(Debug, Clone, PartialEq)]
pub enum RateDecision {
    /// Token debitado; la petición upstream puede proceder.
    Granted,
    /// Presupuesto agotado; reintentar tras la pista indicada.
    Denied { retry_after_ms: u64 },
}

pub struct RateLimitRepository {
    database_client: StoreClient,
}

impl RateLimitRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Intenta debitar un token del bucket global de la fuente.
     *
     * @param source Identificador nominal de la fuente upstream.
     * @param capacity Capacidad de ráfaga del bucket.
     * @param refill_per_second Tasa de recarga documentada.
     */
    #[instrument(skip(self))]
    pub async fn try_acquire(
        &self,
        source: &str,
        capacity: f64,
        refill_per_second: f64,
    ) -> Result<RateDecision, DbError> {
        let now_ms = Utc::now().timestamp_millis();

        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut bucket_rows = transaction
            .query(
                "SELECT tokens, updated_at_ms FROM upstream_rate_buckets WHERE source = ?1",
                params![source],
            )
            .await?;

        let (current_tokens, last_updated_ms) = match bucket_rows.next().await? {
            Some(row) => (row.get::<f64>(0)?, row.get::<i64>(1)?),
            None => (capacity, now_ms),
        };

        // Recarga proporcional al tiempo transcurrido, saturada en capacity.
        let elapsed_seconds = ((now_ms - last_updated_ms).max(0)) as f64 / 1000.0;
        let replenished_tokens = (current_tokens + elapsed_seconds * refill_per_second).min(capacity);

        let decision = if replenished_tokens >= 1.0 {
            transaction
                .execute(
                    "INSERT INTO upstream_rate_buckets (source, tokens, updated_at_ms)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(source) DO UPDATE SET
                         tokens = excluded.tokens,
                         updated_at_ms = excluded.updated_at_ms",
                    params![source, replenished_tokens - 1.0, now_ms],
                )
                .await?;

            RateDecision::Granted
        } else {
            // Persistimos la recarga parcial y calculamos la pista de espera.
            transaction
                .execute(
                    "INSERT INTO upstream_rate_buckets (source, tokens, updated_at_ms)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(source) DO UPDATE SET
                         tokens = excluded.tokens,
                         updated_at_ms = excluded.updated_at_ms",
                    params![source, replenished_tokens, now_ms],
                )
                .await?;

            let deficit = 1.0 - replenished_tokens;
            let retry_after_ms = if refill_per_second > 0.0 {
                (deficit / refill_per_second * 1000.0).ceil() as u64
            } else {
                u64::MAX
            };

            RateDecision::Denied { retry_after_ms }
        };

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(decision)
    }
}
