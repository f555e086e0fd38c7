// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (V3.2 - TOPOLOGY MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 *
 * # Mathematical Proof (Modular Encapsulation):
 * El barrel file actúa como interfaz galvánica: los sub-módulos
 * permanecen aislados y solo las estructuras de autoridad
 * (Repositories) se exponen al exterior, reduciendo el acoplamiento.
 * =================================================================
 */

// --- ESTRATO 1: GOBERNANZA E IDENTIDAD ---

/// Registro de tenants y tokens de enrolamiento de un solo uso.
pub mod tenant;
/// Agentes, credenciales portadoras y snapshots de host.
pub mod agent;

// --- ESTRATO 2: EVIDENCIA Y CONOCIMIENTO ---

/// Scans inmutables y sus dependencias observadas.
pub mod scan;
/// Hallazgos materializados (reemplazo atómico por scan).
pub mod finding;
/// Conocimiento CVE compartido y diccionario de componentes.
pub mod cve;

// --- ESTRATO 3: COLA TÁCTICA Y RECURSOS COMPARTIDOS ---

/// Cola durable de enriquecimiento con leases y dead-letter.
pub mod queue;
/// Caché compartida L2 de veredictos de resolución.
pub mod cache;
/// Presupuesto global de tasa hacia fuentes upstream.
pub mod rate_limit;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS API) ---

pub use agent::{AgentRepository, CredentialResolution, MintedCredential};
pub use cache::SharedCacheRepository;
pub use cve::CveRepository;
pub use finding::FindingRepository;
pub use queue::{LeasedJob, NackOutcome, QueueRepository};
pub use rate_limit::{RateDecision, RateLimitRepository};
pub use scan::{ScanInsertVerdict, ScanRepository};
pub use tenant::{TenantRepository, TokenConsumeVerdict};
