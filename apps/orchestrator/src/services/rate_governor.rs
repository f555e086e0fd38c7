// [apps/orchestrator/src/services/rate_governor.rs]
/*!
 * =================================================================
 * APARATO: INGESTION RATE GOVERNOR (V3.3 - DUAL BUCKET)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: TOKEN BUCKETS POR CREDENCIAL Y POR TENANT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL CITIZENSHIP: Toda petición autenticada debita DOS buckets
 *    (credencial y tenant); exceder cualquiera rechaza con pista de
 *    reintento.
 * 2. PROCESS LOCAL: El estado vive en DashMap del proceso; la flota de
 *    ingesta escala horizontalmente y cada instancia gobierna su cupo.
 * =================================================================
 */

use chrono::Utc;
use dashmap::DashMap;

struct BucketCore {
    tokens: f64,
    updated_at_ms: i64,
}

/// Veredicto del gobernador de ingesta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GovernorVerdict {
    Admitted,
    Throttled { retry_after_ms: u64 },
}

pub struct RateGovernor {
    buckets: DashMap<String, BucketCore>,
}

impl RateGovernor {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Debita un token del bucket nominal, recargando por tiempo transcurrido.
    pub fn take(&self, bucket_key: &str, capacity: f64, refill_per_second: f64) -> GovernorVerdict {
        let now_ms = Utc::now().timestamp_millis();

        let mut bucket = self
            .buckets
            .entry(bucket_key.to_string())
            .or_insert_with(|| BucketCore { tokens: capacity, updated_at_ms: now_ms });

        let elapsed_seconds = ((now_ms - bucket.updated_at_ms).max(0)) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed_seconds * refill_per_second).min(capacity);
        bucket.updated_at_ms = now_ms;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            GovernorVerdict::Admitted
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after_ms = if refill_per_second > 0.0 {
                (deficit / refill_per_second * 1000.0).ceil() as u64
            } else {
                u64::MAX
            };

            GovernorVerdict::Throttled { retry_after_ms }
        }
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new()
    }
}
