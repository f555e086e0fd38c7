// [libs/domain/enrichment/src/fingerprint.rs]
/*!
 * =================================================================
 * APARATO: FINGERPRINT RESOLVER (V3.3 - LEXICAL RE-RANK)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: TUPLA CANÓNICA -> IDENTIFICADOR OFICIAL DE COMPONENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. EXACT FIRST: La coincidencia exacta contra el diccionario local
 *    es autoritativa y corta el pipeline de candidatos.
 * 2. DETERMINISTIC RE-RANK: El desempate de candidatos es (score desc,
 *    forma canónica asc), garantizando veredictos reproducibles para
 *    instantáneas de diccionario idénticas.
 * 3. THRESHOLD GATE: Bajo el umbral τ la tupla se marca 'unidentified'
 *    y viaja como no-match; jamás se inventa un identificador.
 * =================================================================
 */

use sentinel_domain_models::cve::ComponentIdentifier;
use tracing::{debug, instrument};

use crate::errors::EnrichmentError;
use crate::normalize::NormalizedTuple;
use crate::similarity::token_jaccard;
use crate::traits::ComponentDictionary;

/// Veredicto de la fase de resolución de huella.
#[derive(Debug, Clone, PartialEq)]
pub enum FingerprintVerdict {
    /// Uno o más identificadores oficiales vincularon la tupla.
    Matched(Vec<ComponentIdentifier>),
    /// Ningún candidato superó el umbral de similitud.
    Unidentified,
}

/// Resolutor de huellas sobre el diccionario externo de componentes.
pub struct FingerprintResolver<D: ComponentDictionary + ?Sized> {
    dictionary: std::sync::Arc<D>,
    /// Máximo de candidatos K producidos por el generador de texto completo.
    candidate_limit: usize,
    /// Umbral de aceptación τ sobre la similitud Jaccard de tokens.
    similarity_threshold: f64,
}

impl<D: ComponentDictionary + ?Sized> FingerprintResolver<D> {
    pub fn new(
        dictionary: std::sync::Arc<D>,
        candidate_limit: usize,
        similarity_threshold: f64,
    ) -> Self {
        Self {
            dictionary,
            candidate_limit,
            similarity_threshold,
        }
    }

    /**
     * Resuelve la tupla canónica contra el diccionario oficial.
     *
     * # Logic:
     * a. Coincidencia exacta -> autoritativa.
     * b. Generación de hasta K candidatos por texto completo.
     * c. Re-ranking léxico; el mejor candidato >= τ es aceptado con la
     *    versión observada de la tupla.
     */
    #[instrument(skip(self), fields(product = %tuple.name))]
    pub async fn resolve(
        &self,
        tuple: &NormalizedTuple,
    ) -> Result<FingerprintVerdict, EnrichmentError> {
        // --- FASE A: COINCIDENCIA EXACTA ---
        let exact_matches = self.dictionary.exact_lookup(tuple).await?;
        if !exact_matches.is_empty() {
            return Ok(FingerprintVerdict::Matched(exact_matches));
        }

        // --- FASE B: GENERACIÓN DE CANDIDATOS ---
        let candidates = self
            .dictionary
            .candidate_lookup(&tuple.name, self.candidate_limit)
            .await?;

        if candidates.is_empty() {
            return Ok(FingerprintVerdict::Unidentified);
        }

        // --- FASE C: RE-RANKING LÉXICO DETERMINISTA ---
        let observation_material = match &tuple.vendor {
            Some(vendor) => format!("{} {}", vendor, tuple.name),
            None => tuple.name.clone(),
        };

        let mut scored_candidates: Vec<(f64, ComponentIdentifier)> = candidates
            .into_iter()
            .map(|candidate| {
                let candidate_material = format!("{} {}", candidate.vendor, candidate.product);
                (token_jaccard(&observation_material, &candidate_material), candidate)
            })
            .collect();

        scored_candidates.sort_by(|left, right| {
            right
                .0
                .partial_cmp(&left.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| left.1.canonical_form().cmp(&right.1.canonical_form()))
        });

        let (best_score, best_candidate) = &scored_candidates[0];

        if *best_score >= self.similarity_threshold {
            debug!(
                "🔎 [FINGERPRINT]: Candidate [{}] accepted with score {:.3}",
                best_candidate.canonical_form(),
                best_score
            );

            // La versión observada de la tupla viaja con el producto aceptado.
            return Ok(FingerprintVerdict::Matched(vec![ComponentIdentifier::new(
                &best_candidate.vendor,
                &best_candidate.product,
                &tuple.version,
            )]));
        }

        debug!(
            "🕳️  [FINGERPRINT]: Best candidate [{}] below threshold ({:.3} < {:.3}).",
            best_candidate.canonical_form(),
            best_score,
            self.similarity_threshold
        );

        Ok(FingerprintVerdict::Unidentified)
    }
}
