// [apps/orchestrator/src/services/mod.rs]

/// Gobernador de tasa de ingesta (buckets por credencial y tenant).
pub mod rate_governor;
/// Daemon de reconciliación: re-encolado, barridos y higiene de caché.
pub mod reconciler;

pub use rate_governor::RateGovernor;
pub use reconciler::spawn_reconciler;
