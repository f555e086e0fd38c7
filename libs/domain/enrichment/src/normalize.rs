// [libs/domain/enrichment/src/normalize.rs]
/*!
 * =================================================================
 * APARATO: SOFTWARE TUPLE NORMALIZER (V3.2 - CANONICAL FORM)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: CANONICALIZACIÓN DE TUPLAS (NOMBRE, VERSIÓN, VENDOR)
 *
 * # Mathematical Proof (Idempotent Canonicalization):
 * normalize(normalize(x)) = normalize(x). La forma canónica es el
 * punto fijo de la transformación, garantizando que la clave de caché
 * derivada sea estable entre procesos y reinicios.
 * =================================================================
 */

use sentinel_domain_models::scan::DependencyRecord;
use serde::{Deserialize, Serialize};

/// Sufijos de empaquetado comunes que no aportan identidad de producto.
const STRIPPABLE_SUFFIXES: &[&str] = &[".exe", ".app", ".msi", ".dmg"];

/// Tupla canónica producida por la fase de normalización del motor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NormalizedTuple {
    pub name: String,
    /// Versión canónica; cadena vacía cuando el agente no la reportó.
    pub version: String,
    pub vendor: Option<String>,
}

/// Canonicaliza el nombre de producto: minúsculas, recorte, colapso de
/// espacios internos y poda de sufijos de empaquetado.
pub fn normalize_product_name(raw_name: &str) -> String {
    let lowered = raw_name.trim().to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut previous_was_whitespace = false;
    for character in lowered.chars() {
        if character.is_whitespace() {
            if !previous_was_whitespace && !collapsed.is_empty() {
                collapsed.push(' ');
            }
            previous_was_whitespace = true;
        } else {
            collapsed.push(character);
            previous_was_whitespace = false;
        }
    }
    let mut canonical = collapsed.trim_end().to_string();

    // Poda hasta punto fijo: "tool.msi.exe" colapsa a "tool".
    loop {
        let mut stripped_any = false;

        for suffix in STRIPPABLE_SUFFIXES {
            if let Some(stripped) = canonical.strip_suffix(suffix) {
                if !stripped.is_empty() {
                    canonical = stripped.to_string();
                    stripped_any = true;
                }
            }
        }

        if !stripped_any {
            break;
        }
    }

    canonical
}

/// Canonicaliza la versión: recorte y poda del prefijo 'v' convencional.
pub fn normalize_version(raw_version: &str) -> String {
    let trimmed = raw_version.trim();

    let without_prefix = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(trimmed);

    without_prefix.to_lowercase()
}

/// Proyecta una dependencia observada a su tupla canónica.
pub fn normalize_dependency(dependency: &DependencyRecord) -> NormalizedTuple {
    NormalizedTuple {
        name: normalize_product_name(&dependency.name),
        version: dependency
            .version
            .as_deref()
            .map(normalize_version)
            .unwrap_or_default(),
        vendor: dependency
            .vendor
            .as_deref()
            .map(|vendor| vendor.trim().to_lowercase())
            .filter(|vendor| !vendor.is_empty()),
    }
}
