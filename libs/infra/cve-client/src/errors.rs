// [libs/infra/cve-client/src/errors.rs]
//! =================================================================
//! APARATO: UPSTREAM CLIENT ERRORS (V3.1)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE COMUNICACIÓN UPSTREAM
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("NETWORK_UNREACHABLE: Failed to reach CVE source: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("SOURCE_REJECTION: Server returned status {0}")]
    ServerRejection(String),

    #[error("CIRCUIT_OPEN: Source shielded after consecutive failures")]
    CircuitOpen,

    #[error("RATE_BUDGET_DENIED: Global budget exhausted (retry_after_ms={retry_after_ms})")]
    RateDenied { retry_after_ms: u64 },

    #[error("REQUEST_DEADLINE_EXHAUSTED: Window elapsed before response")]
    DeadlineExceeded,

    #[error("ENVELOPE_CORRUPTION: Failed to decode CVE payload: {0}")]
    DecodingFault(String),
}
