// [libs/infra/cve-client/src/breaker.rs]
/*!
 * =================================================================
 * APARATO: UPSTREAM CIRCUIT BREAKER (V3.2 - PHOENIX SHIELD)
 * CLASIFICACIÓN: INFRASTRUCTURE RESILIENCE (ESTRATO L3)
 * RESPONSABILIDAD: ESCUDO DE FALLOS CONSECUTIVOS HACIA LA FUENTE
 *
 * # Logic:
 * Closed -> (fallos >= umbral) -> Open -> (cooldown) -> HalfOpen.
 * En HalfOpen una única sonda decide: éxito re-sella Closed, fallo
 * re-abre. Mientras Open, el cliente no emite tráfico y el motor
 * degrada a material 'stale-ok' de la caché cuando existe.
 * =================================================================
 */

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Veredicto de admisión previo a una petición upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerVerdict {
    /// Tráfico admitido (Closed o sonda HalfOpen).
    Admitted,
    /// Escudo activo; no se emite tráfico.
    Shielded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerCore {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    core: Mutex<BreakerCore>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            core: Mutex::new(BreakerCore {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Evalúa la admisión de tráfico y gestiona la transición a HalfOpen.
    pub fn preflight(&self) -> BreakerVerdict {
        let mut core = self.core.lock().expect("LOCK_POISONED: Breaker core inaccessible.");

        match core.state {
            BreakerState::Closed | BreakerState::HalfOpen => BreakerVerdict::Admitted,
            BreakerState::Open => {
                let cooled_down = core
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.cooldown)
                    .unwrap_or(true);

                if cooled_down {
                    core.state = BreakerState::HalfOpen;
                    info!("🩹 [BREAKER]: Cooldown elapsed; admitting probe traffic (half-open).");
                    BreakerVerdict::Admitted
                } else {
                    BreakerVerdict::Shielded
                }
            }
        }
    }

    /// Una respuesta sana re-sella el circuito.
    pub fn record_success(&self) {
        let mut core = self.core.lock().expect("LOCK_POISONED: Breaker core inaccessible.");

        if core.state != BreakerState::Closed {
            info!("✅ [BREAKER]: Probe healthy; circuit resealed.");
        }

        core.state = BreakerState::Closed;
        core.consecutive_failures = 0;
        core.opened_at = None;
    }

    /// Un fallo consume presupuesto; la sonda HalfOpen re-abre de inmediato.
    pub fn record_failure(&self) {
        let mut core = self.core.lock().expect("LOCK_POISONED: Breaker core inaccessible.");

        core.consecutive_failures += 1;

        let must_trip = core.state == BreakerState::HalfOpen
            || core.consecutive_failures >= self.failure_threshold;

        if must_trip && core.state != BreakerState::Open {
            core.state = BreakerState::Open;
            core.opened_at = Some(Instant::now());
            warn!(
                "⛔ [BREAKER]: Circuit tripped after {} consecutive failures.",
                core.consecutive_failures
            );
        }
    }

    pub fn is_open(&self) -> bool {
        let core = self.core.lock().expect("LOCK_POISONED: Breaker core inaccessible.");
        core.state == BreakerState::Open
    }
}
