// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT (V3.1 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * # Mathematical Proof (Modular Encapsulation):
 * Al declarar 'pub mod' aquí, Rust genera un grafo de visibilidad
 * donde los handlers, guardias y servicios son hermanos bajo el mismo
 * tronco 'crate', habilitando la inyección de dependencias en compilación.
 * =================================================================
 */

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Configuración reconocida del entorno C2.
pub mod config;
/// Contenedor de estado compartido del orquestador.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Contrato soberano de errores HTTP hacia los agentes.
pub mod errors;
/// Adaptadores de entrada para ráfagas HTTP.
pub mod handlers;
/// Núcleo de mando y control para la ignición de servicios.
pub mod kernel;
/// El túnel de mando: definición de rutas y topología de red.
pub mod routes;

// --- ESTRATO DE SEGURIDAD Y SOPORTE ---
/// Guardianes perimetrales de credencial, operador y carga.
pub mod middleware;
/// Daemons de fondo: reconciliación y gobernanza de tasa.
pub mod services;

/**
 * PRELUDIO DEL ORQUESTADOR
 *
 * Re-exportación estratégica de los componentes necesarios para
 * la ignición mínima del sistema desde 'main.rs'.
 */
pub mod prelude {
    pub use crate::config::IngestConfig;
    pub use crate::kernel::IngestionKernel;
    pub use crate::routes::create_ingestion_router;
    pub use crate::state::AppState;
}
