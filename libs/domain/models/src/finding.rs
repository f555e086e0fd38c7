// [libs/domain/models/src/finding.rs]
// =================================================================
// APARATO: FINDING DOMAIN MODEL (V3.5)
// RESPONSABILIDAD: EMPAREJAMIENTO MATERIALIZADO DEPENDENCIA x CVE
// ESTADO: NO-REGRESSIONS / AUDIT-READY
// =================================================================

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Prioridad derivada determinísticamente de la puntuación CVSS.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FindingPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl FindingPriority {
    /// Regla de derivación soberana:
    /// critical <=> s >= 9.0 | high <=> 7.0 <= s < 9.0 |
    /// medium <=> 4.0 <= s < 7.0 | low <=> s < 4.0
    pub fn from_cvss_score(score: f64) -> Self {
        if score >= 9.0 {
            FindingPriority::Critical
        } else if score >= 7.0 {
            FindingPriority::High
        } else if score >= 4.0 {
            FindingPriority::Medium
        } else {
            FindingPriority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingPriority::Critical => "critical",
            FindingPriority::High => "high",
            FindingPriority::Medium => "medium",
            FindingPriority::Low => "low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "critical" => Some(FindingPriority::Critical),
            "high" => Some(FindingPriority::High),
            "medium" => Some(FindingPriority::Medium),
            "low" => Some(FindingPriority::Low),
            _ => None,
        }
    }
}

/// El producto final del pipeline: una dependencia observada en un agente
/// emparejada con un CVE que la afecta.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub finding_id: String,
    pub tenant_id: String,
    pub agent_id: String,
    pub scan_id: String,
    pub dependency_name: String,
    pub dependency_version: String,
    /// Forma canónica del componente que vinculó la dependencia al CVE.
    pub component_identifier: String,
    pub cve_id: String,
    pub priority: FindingPriority,
    pub detected_at: String,
}
