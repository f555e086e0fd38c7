// [apps/enrich-worker/src/budget.rs]
/*!
 * =================================================================
 * APARATO: FLEET RATE BUDGET ADAPTER (V3.1)
 * CLASIFICACIÓN: INFRASTRUCTURE GLUE (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: PRESUPUESTO GLOBAL DE TASA SOBRE EL LEDGER COMPARTIDO
 *
 * # Logic:
 * El uplink CVE consume el presupuesto por contrato (RateBudget); este
 * adaptador lo implementa sobre el bucket persistido en el Ledger, de
 * modo que escalar el número de procesos worker jamás excede la tasa
 * documentada de la fuente upstream.
 * =================================================================
 */

use async_trait::async_trait;
use sentinel_infra_cve_client::{BudgetDecision, RateBudget};
use sentinel_infra_db::repositories::{RateDecision, RateLimitRepository};
use sentinel_infra_db::StoreClient;

pub struct StoreRateBudget {
    repository: RateLimitRepository,
    capacity: f64,
    refill_per_second: f64,
}

impl StoreRateBudget {
    pub fn new(store_client: StoreClient, capacity: f64, refill_per_second: f64) -> Self {
        Self {
            repository: RateLimitRepository::new(store_client),
            capacity,
            refill_per_second,
        }
    }
}

#[async_trait]
impl RateBudget for StoreRateBudget {
    async fn try_acquire(&self, source: &str) -> Result<BudgetDecision, String> {
        match self
            .repository
            .try_acquire(source, self.capacity, self.refill_per_second)
            .await
        {
            Ok(RateDecision::Granted) => Ok(BudgetDecision::Granted),
            Ok(RateDecision::Denied { retry_after_ms }) => {
                Ok(BudgetDecision::Denied { retry_after_ms })
            }
            Err(budget_fault) => Err(budget_fault.to_string()),
        }
    }
}
