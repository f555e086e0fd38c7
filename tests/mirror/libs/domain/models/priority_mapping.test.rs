// [tests/mirror/libs/domain/models/priority_mapping.test.rs]
/**
 * =================================================================
 * APARATO: PRIORITY MAPPING CERTIFICATION (V3.0 - PROVING GROUNDS)
 * CLASIFICACIÓN: PROPERTY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN TOTAL DE LA REGLA CVSS -> PRIORIDAD
 *
 * # Mathematical Proof (Total Mapping):
 * Para todo s en [0.0, 10.0]: priority(s) = critical <=> s >= 9.0,
 * high <=> 7.0 <= s < 9.0, medium <=> 4.0 <= s < 7.0, low <=> s < 4.0.
 * Las fronteras exactas se certifican de forma nominal; el interior
 * del dominio se barre con proptest.
 * =================================================================
 */

use proptest::prelude::*;
use sentinel_domain_models::finding::FindingPriority;

/// CERTIFICACIÓN NOMINAL: Fronteras exactas de la regla de derivación.
#[test]
fn certify_priority_boundaries() {
    assert_eq!(FindingPriority::from_cvss_score(10.0), FindingPriority::Critical);
    assert_eq!(FindingPriority::from_cvss_score(9.0), FindingPriority::Critical);
    assert_eq!(FindingPriority::from_cvss_score(8.999), FindingPriority::High);
    assert_eq!(FindingPriority::from_cvss_score(7.0), FindingPriority::High);
    assert_eq!(FindingPriority::from_cvss_score(6.999), FindingPriority::Medium);
    assert_eq!(FindingPriority::from_cvss_score(4.0), FindingPriority::Medium);
    assert_eq!(FindingPriority::from_cvss_score(3.999), FindingPriority::Low);
    assert_eq!(FindingPriority::from_cvss_score(0.0), FindingPriority::Low);
}

/// CERTIFICACIÓN TEXTUAL: Paridad de formas serializadas del veredicto.
#[test]
fn certify_priority_textual_parity() {
    for priority in [
        FindingPriority::Critical,
        FindingPriority::High,
        FindingPriority::Medium,
        FindingPriority::Low,
    ] {
        assert_eq!(FindingPriority::parse(priority.as_str()), Some(priority));
    }

    assert_eq!(FindingPriority::parse("catastrophic"), None);
}

proptest! {
    /// BARRIDO PROPTEST: La regla es total y coherente en todo el dominio CVSS.
    #[test]
    fn certify_priority_rule_is_total(score in 0.0f64..=10.0f64) {
        let verdict = FindingPriority::from_cvss_score(score);

        let expected = if score >= 9.0 {
            FindingPriority::Critical
        } else if score >= 7.0 {
            FindingPriority::High
        } else if score >= 4.0 {
            FindingPriority::Medium
        } else {
            FindingPriority::Low
        };

        prop_assert_eq!(verdict, expected);
    }
}
