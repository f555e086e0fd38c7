// [libs/domain/enrichment/src/similarity.rs]
//! =================================================================
//! APARATO: LEXICAL SIMILARITY ENGINE (V3.0)
//! CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
//! RESPONSABILIDAD: RE-RANKING DE CANDIDATOS POR JACCARD DE TOKENS
//! =================================================================

use std::collections::HashSet;

/// Fragmenta un literal en tokens alfanuméricos minúsculos.
pub fn tokenize(material: &str) -> HashSet<String> {
    material
        .to_lowercase()
        .split(|character: char| !character.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Similitud de Jaccard sobre conjuntos de tokens: |A ∩ B| / |A ∪ B|.
/// Dos conjuntos vacíos no aportan evidencia y puntúan 0.0.
pub fn token_jaccard(left: &str, right: &str) -> f64 {
    let left_tokens = tokenize(left);
    let right_tokens = tokenize(right);

    if left_tokens.is_empty() || right_tokens.is_empty() {
        return 0.0;
    }

    let intersection_cardinality = left_tokens.intersection(&right_tokens).count();
    let union_cardinality = left_tokens.union(&right_tokens).count();

    intersection_cardinality as f64 / union_cardinality as f64
}
