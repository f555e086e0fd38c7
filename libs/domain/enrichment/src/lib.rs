// [libs/domain/enrichment/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ENRICHMENT ENGINE ROOT (V3.0 - SINGULARITY COLLAPSED)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L2-DOMAIN)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS DEL MOTOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE ENGINE AUTHORITY: Un único pipeline de enriquecimiento;
 *    el sub-loteo y el paralelismo son asunto del pool de workers,
 *    jamás de servicios paralelos fragmentados.
 * 2. SEAM TRAITS: El diccionario de componentes, el almacén CVE, la
 *    caché compartida y los upstreams se consumen por contrato,
 *    permitiendo sustitución total en el Proving Grounds.
 * =================================================================
 */

pub mod cache;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod metrics;
pub mod normalize;
pub mod similarity;
pub mod traits;

pub use cache::{CacheKey, CachedVerdict, ProcessCache, ResolvedVulnerability, TieredCache};
pub use engine::{BatchFailure, BatchOutcome, EngineConfig, EnrichmentEngine};
pub use errors::{EnrichmentError, UpstreamFault};
pub use fingerprint::{FingerprintResolver, FingerprintVerdict};
pub use metrics::EngineMetrics;
pub use normalize::{normalize_dependency, NormalizedTuple};
pub use traits::{ComponentDictionary, SharedCache, UpstreamSource, VulnerabilityStore};
