// [libs/infra/cve-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN CVE UPLINK (V3.5 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: NEGOCIACIÓN RESILIENTE CON FUENTES UPSTREAM CVE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. GLOBAL BUDGET FIRST: Cada intento debita el presupuesto de tasa
 *    compartido de la flota ANTES de tocar la red; escalar workers
 *    jamás excede el contrato documentado de la fuente.
 * 2. IDEMPOTENT RETRY ONLY: Solo los GET se reintentan, con back-off
 *    exponencial acotado y jitter aleatorio.
 * 3. BREAKER DISCIPLINE: Fallos consecutivos disparan el escudo; el
 *    motor degrada a material 'stale-ok' mientras el circuito sana.
 * =================================================================
 */

use crate::breaker::{BreakerVerdict, CircuitBreaker};
use crate::errors::ClientError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::{Client, StatusCode};
use sentinel_domain_enrichment::errors::UpstreamFault;
use sentinel_domain_enrichment::traits::UpstreamSource;
use sentinel_domain_models::cve::{ComponentIdentifier, CveRecord};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Veredicto del presupuesto global de tasa de la flota.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetDecision {
    Granted,
    Denied { retry_after_ms: u64 },
}

/// Costura hacia el presupuesto compartido (implementada sobre el Ledger).
#[async_trait]
pub trait RateBudget: Send + Sync {
    async fn try_acquire(&self, source: &str) -> Result<BudgetDecision, String>;
}

/// Parámetros de sintonía del uplink, inyectados desde el entorno C2.
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub source_name: String,
    pub base_endpoint: String,
    pub api_key: Option<String>,
    pub max_retry_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl UpstreamClientConfig {
    pub fn new(source_name: &str, base_endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            source_name: source_name.to_string(),
            base_endpoint: base_endpoint.trim_end_matches('/').to_string(),
            api_key,
            max_retry_attempts: 3,
            backoff_base_ms: 250,
            backoff_cap_ms: 5_000,
            breaker_failure_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

/// Sobre de transporte del feed upstream de vulnerabilidades.
#[derive(Deserialize)]
struct VulnerabilityFeedEnvelope {
    vulnerabilities: Vec<VulnerabilityFeedEntry>,
}

#[derive(Deserialize)]
struct VulnerabilityFeedEntry {
    cve_id: String,
    description: String,
    severity: String,
    cvss_score: f64,
    published_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    #[serde(default)]
    affected_components: Vec<String>,
}

pub struct UpstreamCveClient {
    network_session_client: Client,
    breaker: CircuitBreaker,
    rate_budget: Arc<dyn RateBudget>,
    config: UpstreamClientConfig,
}

impl UpstreamCveClient {
    /**
     * Inicializa el uplink con seguridad de cabeceras.
     *
     * # Errors:
     * Retorna error si la llave API contiene material no representable
     * en una cabecera HTTP.
     */
    pub fn new(
        config: UpstreamClientConfig,
        rate_budget: Arc<dyn RateBudget>,
    ) -> Result<Self, ClientError> {
        let mut header_map = reqwest::header::HeaderMap::new();

        if let Some(api_key) = &config.api_key {
            let api_key_value = reqwest::header::HeaderValue::from_str(api_key)
                .map_err(|fault| ClientError::DecodingFault(format!("API_KEY_MATERIAL: {}", fault)))?;
            header_map.insert("x-api-key", api_key_value);
        }

        let network_session_client = Client::builder()
            .default_headers(header_map)
            .user_agent("Sentinel-Enrichment-Uplink/V3.5")
            .build()
            .map_err(ClientError::NetworkFault)?;

        Ok(Self {
            network_session_client,
            breaker: CircuitBreaker::new(config.breaker_failure_threshold, config.breaker_cooldown),
            rate_budget,
            config,
        })
    }

    /**
     * Consulta los CVE que afectan al componente dentro de la ventana dada.
     *
     * # Logic:
     * breaker -> presupuesto global -> GET con reintentos acotados.
     * Un 404 upstream es un conjunto vacío autoritativo, no un fallo.
     */
    #[instrument(skip(self), fields(source = %self.config.source_name))]
    pub async fn fetch_cves_for_component(
        &self,
        component: &ComponentIdentifier,
        window: Duration,
    ) -> Result<Vec<CveRecord>, ClientError> {
        if self.breaker.preflight() == BreakerVerdict::Shielded {
            return Err(ClientError::CircuitOpen);
        }

        let request_deadline = Instant::now() + window;
        let target_url = format!(
            "{}/components/{}/cves",
            self.config.base_endpoint,
            component.canonical_form()
        );

        let mut attempt_index: u32 = 0;

        loop {
            let remaining_window = request_deadline.saturating_duration_since(Instant::now());
            if remaining_window.is_zero() {
                self.breaker.record_failure();
                return Err(ClientError::DeadlineExceeded);
            }

            // --- PRESUPUESTO GLOBAL DE FLOTA (cada intento debita) ---
            match self
                .rate_budget
                .try_acquire(&self.config.source_name)
                .await
                .map_err(|fault| ClientError::ServerRejection(format!("BUDGET_LINK_FAULT: {}", fault)))?
            {
                BudgetDecision::Granted => {}
                BudgetDecision::Denied { retry_after_ms } => {
                    return Err(ClientError::RateDenied { retry_after_ms });
                }
            }

            let network_attempt = self
                .network_session_client
                .get(&target_url)
                .timeout(remaining_window)
                .send()
                .await;

            match network_attempt {
                Ok(response) if response.status() == StatusCode::OK => {
                    let envelope = response
                        .json::<VulnerabilityFeedEnvelope>()
                        .await
                        .map_err(|fault| ClientError::DecodingFault(fault.to_string()))?;

                    self.breaker.record_success();
                    return Ok(envelope
                        .vulnerabilities
                        .into_iter()
                        .map(|entry| CveRecord {
                            cve_id: entry.cve_id,
                            description: entry.description,
                            severity: entry.severity,
                            cvss_score: entry.cvss_score,
                            published_at: entry.published_at,
                            modified_at: entry.modified_at,
                            affected_components: entry.affected_components,
                        })
                        .collect());
                }
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    // Componente desconocido para la fuente: conjunto vacío autoritativo.
                    self.breaker.record_success();
                    return Ok(Vec::new());
                }
                Ok(response) if Self::is_retryable_status(response.status()) => {
                    debug!(
                        "🔁 [UPLINK_RETRY]: Attempt {} received HTTP_{}.",
                        attempt_index,
                        response.status()
                    );
                }
                Ok(response) => {
                    // Rechazo no reintentable (4xx de contrato).
                    self.breaker.record_failure();
                    return Err(ClientError::ServerRejection(format!("HTTP_{}", response.status())));
                }
                Err(network_fault) => {
                    debug!("🔁 [UPLINK_RETRY]: Attempt {} network fault: {}", attempt_index, network_fault);
                }
            }

            attempt_index += 1;
            if attempt_index >= self.config.max_retry_attempts {
                self.breaker.record_failure();
                warn!(
                    "❌ [UPLINK_FAULT]: Source [{}] exhausted {} attempts for [{}].",
                    self.config.source_name,
                    attempt_index,
                    component.canonical_form()
                );
                return Err(ClientError::ServerRejection("RETRY_BUDGET_EXHAUSTED".to_string()));
            }

            // --- BACK-OFF EXPONENCIAL ACOTADO CON JITTER ---
            let exponential_ms = self
                .config
                .backoff_base_ms
                .saturating_mul(1u64 << attempt_index.min(16))
                .min(self.config.backoff_cap_ms);
            let jittered_ms = rand::thread_rng().gen_range(0..=exponential_ms);

            tokio::time::sleep(Duration::from_millis(jittered_ms)).await;
        }
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

// --- IMPLEMENTACIÓN DE LA COSTURA UPSTREAM DEL MOTOR ---

#[async_trait]
impl UpstreamSource for UpstreamCveClient {
    fn source_name(&self) -> &str {
        &self.config.source_name
    }

    async fn fetch_cves(
        &self,
        component: &ComponentIdentifier,
        window: Duration,
    ) -> Result<Vec<CveRecord>, UpstreamFault> {
        self.fetch_cves_for_component(component, window)
            .await
            .map_err(|client_fault| match client_fault {
                ClientError::CircuitOpen => UpstreamFault::CircuitOpen,
                ClientError::RateDenied { retry_after_ms } => UpstreamFault::RateDenied { retry_after_ms },
                ClientError::DeadlineExceeded => UpstreamFault::DeadlineExceeded,
                ClientError::DecodingFault(detail) => UpstreamFault::Decoding(detail),
                other => UpstreamFault::Temporary(other.to_string()),
            })
    }
}
