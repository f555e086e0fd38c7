// [tests/mirror/libs/domain/enrichment/fingerprint_resolution.test.rs]
/**
 * =================================================================
 * APARATO: FINGERPRINT RESOLUTION CERTIFICATION (V3.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-ENGINE)
 * RESPONSABILIDAD: EXACTO > CANDIDATOS > UMBRAL τ > UNIDENTIFIED
 * =================================================================
 */

use async_trait::async_trait;
use sentinel_domain_enrichment::errors::EnrichmentError;
use sentinel_domain_enrichment::fingerprint::{FingerprintResolver, FingerprintVerdict};
use sentinel_domain_enrichment::normalize::NormalizedTuple;
use sentinel_domain_enrichment::traits::ComponentDictionary;
use sentinel_domain_models::cve::ComponentIdentifier;
use std::sync::Arc;

/// Doble determinista del diccionario externo.
struct StubDictionary {
    exact_entries: Vec<ComponentIdentifier>,
    candidate_entries: Vec<ComponentIdentifier>,
}

#[async_trait]
impl ComponentDictionary for StubDictionary {
    async fn exact_lookup(
        &self,
        tuple: &NormalizedTuple,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError> {
        Ok(self
            .exact_entries
            .iter()
            .filter(|entry| entry.product == tuple.name && entry.version == tuple.version)
            .cloned()
            .collect())
    }

    async fn candidate_lookup(
        &self,
        _product_hint: &str,
        limit: usize,
    ) -> Result<Vec<ComponentIdentifier>, EnrichmentError> {
        Ok(self.candidate_entries.iter().take(limit).cloned().collect())
    }
}

fn tuple(name: &str, version: &str, vendor: Option<&str>) -> NormalizedTuple {
    NormalizedTuple {
        name: name.to_string(),
        version: version.to_string(),
        vendor: vendor.map(|v| v.to_string()),
    }
}

/**
 * CERTIFICACIÓN: La coincidencia exacta es autoritativa y corta el
 * pipeline de candidatos.
 */
#[tokio::test]
async fn certify_exact_match_short_circuits() {
    let dictionary = Arc::new(StubDictionary {
        exact_entries: vec![ComponentIdentifier::new("f5", "nginx", "1.21.0")],
        candidate_entries: vec![ComponentIdentifier::new("igor_sysoev", "nginx", "")],
    });

    let resolver = FingerprintResolver::new(dictionary, 10, 0.5);
    let verdict = resolver.resolve(&tuple("nginx", "1.21.0", None)).await.expect("FAULT");

    assert_eq!(
        verdict,
        FingerprintVerdict::Matched(vec![ComponentIdentifier::new("f5", "nginx", "1.21.0")])
    );
}

/**
 * CERTIFICACIÓN: El mejor candidato sobre τ es aceptado portando la
 * versión observada de la tupla.
 */
#[tokio::test]
async fn certify_candidate_rerank_above_threshold() {
    let dictionary = Arc::new(StubDictionary {
        exact_entries: Vec::new(),
        candidate_entries: vec![
            ComponentIdentifier::new("postgresql", "postgresql", ""),
            ComponentIdentifier::new("apache", "http server", ""),
        ],
    });

    let resolver = FingerprintResolver::new(dictionary, 10, 0.4);
    let verdict = resolver
        .resolve(&tuple("http server", "2.4.54", Some("apache")))
        .await
        .expect("FAULT");

    match verdict {
        FingerprintVerdict::Matched(components) => {
            assert_eq!(components.len(), 1);
            assert_eq!(components[0].vendor, "apache");
            assert_eq!(components[0].product, "http server");
            assert_eq!(components[0].version, "2.4.54", "VERSION_BINDING: observed version must travel.");
        }
        FingerprintVerdict::Unidentified => panic!("RERANK_BREACH: expected a match above threshold."),
    }
}

/**
 * CERTIFICACIÓN: Bajo τ la tupla queda 'unidentified'; jamás se
 * inventa un identificador.
 */
#[tokio::test]
async fn certify_below_threshold_is_unidentified() {
    let dictionary = Arc::new(StubDictionary {
        exact_entries: Vec::new(),
        candidate_entries: vec![ComponentIdentifier::new("oracle", "mysql", "")],
    });

    let resolver = FingerprintResolver::new(dictionary, 10, 0.9);
    let verdict = resolver
        .resolve(&tuple("totally-bespoke-tool", "0.1", None))
        .await
        .expect("FAULT");

    assert_eq!(verdict, FingerprintVerdict::Unidentified);
}

/**
 * CERTIFICACIÓN: Un diccionario sin candidatos produce 'unidentified'.
 */
#[tokio::test]
async fn certify_empty_dictionary_is_unidentified() {
    let dictionary = Arc::new(StubDictionary {
        exact_entries: Vec::new(),
        candidate_entries: Vec::new(),
    });

    let resolver = FingerprintResolver::new(dictionary, 10, 0.1);
    let verdict = resolver.resolve(&tuple("anything", "1.0", None)).await.expect("FAULT");

    assert_eq!(verdict, FingerprintVerdict::Unidentified);
}
