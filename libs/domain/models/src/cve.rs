// [libs/domain/models/src/cve.rs]
/*!
 * =================================================================
 * APARATO: CVE REFERENCE MODELS (V3.3 - SHARED KNOWLEDGE)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIFICADORES CANÓNICOS Y REGISTROS DE VULNERABILIDAD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TENANT AGNOSTIC: El conocimiento CVE es material de referencia
 *    compartido; jamás porta tenant_id.
 * 2. MODIFIED-AT AUTHORITY: 'modified_at' permite sobreescritura del
 *    registro, nunca bifurcación. Ante desacuerdo de upstreams, el
 *    'modified_at' más reciente gana.
 * 3. CANONICAL FORM: El identificador de componente sigue la forma
 *    oficial 'vendor:product:version' del ecosistema upstream.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Identificador canónico `vendor:product:version` de un componente de software.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ComponentIdentifier {
    pub vendor: String,
    pub product: String,
    pub version: String,
}

impl ComponentIdentifier {
    pub fn new(vendor: &str, product: &str, version: &str) -> Self {
        Self {
            vendor: vendor.to_string(),
            product: product.to_string(),
            version: version.to_string(),
        }
    }

    /// Forma textual canónica consumida por las tablas de afectación.
    pub fn canonical_form(&self) -> String {
        format!("{}:{}:{}", self.vendor, self.product, self.version)
    }

    /// Reconstruye el identificador desde su forma textual canónica.
    pub fn parse(canonical: &str) -> Option<Self> {
        let mut segments = canonical.splitn(3, ':');
        let vendor = segments.next()?;
        let product = segments.next()?;
        let version = segments.next()?;

        if product.is_empty() {
            return None;
        }

        Some(Self::new(vendor, product, version))
    }
}

impl std::fmt::Display for ComponentIdentifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.canonical_form())
    }
}

/// Registro publicado de vulnerabilidad, identificado por un id estable
/// y puntuado por CVSS.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveRecord {
    pub cve_id: String,
    pub description: String,
    pub severity: String,
    pub cvss_score: f64,
    pub published_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Formas canónicas `vendor:product:version` afectadas por este CVE.
    pub affected_components: Vec<String>,
}
