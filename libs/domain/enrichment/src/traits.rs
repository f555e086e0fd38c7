// [libs/domain/enrichment/src/traits.rs]
/*!
 * =================================================================
 * APARATO: ENGINE SEAM CONTRACTS (V3.1 - DEPENDENCY INVERSION)
 * CLASIFICACIÓN: DOMAIN CONTRACTS (ESTRATO L2)
 * RESPONSABILIDAD: COSTURAS DEL MOTOR HACIA DICCIONARIO, ALMACÉN,
 *                  CACHÉ COMPARTIDA Y UPSTREAMS
 *
 * # Logic:
 * El motor jamás conoce libSQL ni reqwest. La infraestructura (L3)
 * implementa estos contratos, y el Proving Grounds los sustituye por
 * dobles deterministas sin tocar la física del pipeline.
 * =================================================================
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_domain_models::cve::{ComponentIdentifier, CveRecord};
use std::time::Duration;

use crate::cache::{CacheKey, CachedVerdict};
use crate::errors::{EnrichmentError, UpstreamFault};
use crate::normalize::NormalizedTuple;

/// Diccionario de componentes consultable: el motor NO exige un corpus
/// residente en memoria; la búsqueda exacta y la generación de candidatos
/// se delegan al almacén externo.
#[async_trait]
pub trait ComponentDictionary: Send + Sync {
    /// Coincidencia exacta contra el diccionario local (sembrado del feed oficial).
    async fn exact_lookup(
        &self,
        tuple: &NormalizedTuple,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError>;

    /// Generador de candidatos por texto completo; hasta 'limit' resultados.
    async fn candidate_lookup(
        &self,
        product_hint: &str,
        limit: usize,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError>;
}

/// Almacén local de conocimiento CVE (material de referencia compartido).
#[async_trait]
pub trait VulnerabilityStore: Send + Sync {
    /// CVEs cuyo conjunto de componentes afectados contiene al identificador.
    async fn cves_for_component(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Vec<CveRecord>, EnrichmentError>;

    /// Persistencia idempotente; ante desacuerdo gana el modified_at más reciente.
    async fn persist_cve_records(&self, records: &[CveRecord]) -> Result<(), EnrichmentError>;

    /// Última sincronización upstream conocida para el componente.
    async fn component_refreshed_at(
        &self,
        component: &ComponentIdentifier,
    ) -> Result<Option<DateTime<Utc>>, EnrichmentError>;

    /// Sella la frescura del componente tras una sincronización exitosa.
    async fn mark_component_refreshed(
        &self,
        component: &ComponentIdentifier,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), EnrichmentError>;
}

/// Caché compartida entre procesos (nivel L2), escribible de forma idempotente.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> Result<Option<CachedVerdict>, EnrichmentError>;

    async fn store(
        &self,
        key: &CacheKey,
        verdict: &CachedVerdict,
        time_to_live: Duration,
    ) -> Result<(), EnrichmentError>;
}

/// Cliente de una fuente upstream de datos CVE (limitada y con breaker).
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Nombre nominal de la fuente para observabilidad y presupuesto de tasa.
    fn source_name(&self) -> &str;

    /// Consulta los CVE que afectan al componente, dentro de la ventana dada.
    async fn fetch_cves(
        &self,
        component: &ComponentIdentifier,
        window: Duration,
    ) -> Result<Vec<CveRecord>, UpstreamFault>;
}
