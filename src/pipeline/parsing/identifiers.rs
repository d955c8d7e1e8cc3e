use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::normalize::fold_accents;
use crate::models::AnalyteValue;

/// Values closer than this are the same reading.
pub const DUPLICATE_EPSILON: f64 = 0.01;

/// Alias → canonical id. Keys are accent-folded lowercase with `_` separators.
static ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("eritrocitos", "eritrocitos"),
        ("hemacias", "eritrocitos"),
        ("globulos_vermelhos", "eritrocitos"),
        ("rbc", "eritrocitos"),
        ("hemoglobina", "hemoglobina"),
        ("hb", "hemoglobina"),
        ("hgb", "hemoglobina"),
        ("hematocrito", "hematocrito"),
        ("ht", "hematocrito"),
        ("hct", "hematocrito"),
        ("vcm", "vcm"),
        ("volume_corpuscular_medio", "vcm"),
        ("hcm", "hcm"),
        ("hemoglobina_corpuscular_media", "hcm"),
        ("chcm", "chcm"),
        ("rdw", "rdw"),
        ("leucocitos", "leucocitos"),
        ("leucocitos_totais", "leucocitos"),
        ("globulos_brancos", "leucocitos"),
        ("wbc", "leucocitos"),
        ("neutrofilos", "neutrofilos"),
        ("neutrofilos_totais", "neutrofilos"),
        ("segmentados", "segmentados"),
        ("bastonetes", "bastonetes"),
        ("eosinofilos", "eosinofilos"),
        ("basofilos", "basofilos"),
        ("linfocitos", "linfocitos"),
        ("linfocitos_tipicos", "linfocitos"),
        ("monocitos", "monocitos"),
        ("plaquetas", "plaquetas"),
        ("contagem_de_plaquetas", "plaquetas"),
        ("plt", "plaquetas"),
    ])
});

/// Canonical id → display name.
static DISPLAY_NAMES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("eritrocitos", "Eritrócitos"),
        ("hemoglobina", "Hemoglobina"),
        ("hematocrito", "Hematócrito"),
        ("vcm", "VCM"),
        ("hcm", "HCM"),
        ("chcm", "CHCM"),
        ("rdw", "RDW"),
        ("leucocitos", "Leucócitos"),
        ("neutrofilos", "Neutrófilos"),
        ("segmentados", "Segmentados"),
        ("bastonetes", "Bastonetes"),
        ("eosinofilos", "Eosinófilos"),
        ("basofilos", "Basófilos"),
        ("linfocitos", "Linfócitos"),
        ("monocitos", "Monócitos"),
        ("plaquetas", "Plaquetas"),
    ])
});

/// Marked variant suffixes pattern tables append to a base id (`_alt`, `_alt2`, `_ocr`, `_v2`).
static VARIANT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:_(?:alt|ocr|var)\d*|_v\d+)+$").expect("valid regex"));

/// Bare numeric tail (`_2`). Part of the name for `ca_125` or `vitamina_b_12`,
/// so only stripped when the remainder is a known alias.
static NUMERIC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:_\d+)+$").expect("valid regex"));

/// Accent-folded, lowercase, `_`-separated lookup key.
pub fn lookup_key(id: &str) -> String {
    fold_accents(id.trim())
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Collapse a pattern-variant identifier to its canonical form.
///
/// Unknown identifiers keep their folded key with marked variant suffixes
/// removed; distinct analytes are only ever merged through the alias table.
pub fn canonical_id(id: &str) -> String {
    let key = lookup_key(id);
    if let Some(canonical) = ALIASES.get(key.as_str()) {
        return (*canonical).to_string();
    }

    let base = match VARIANT_SUFFIX.replace(&key, "") {
        stripped if stripped.is_empty() => key.clone(),
        stripped => stripped.into_owned(),
    };
    if let Some(canonical) = ALIASES.get(base.as_str()) {
        return (*canonical).to_string();
    }

    let bare = NUMERIC_SUFFIX.replace(&base, "");
    match ALIASES.get(bare.as_ref()) {
        Some(canonical) => (*canonical).to_string(),
        None => base,
    }
}

/// Human-facing name for a canonical id; unknown ids are title-cased.
pub fn display_name(canonical_id: &str) -> String {
    if let Some(name) = DISPLAY_NAMES.get(canonical_id) {
        return (*name).to_string();
    }
    canonical_id
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A later capture that disagreed with the value already kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateConflict {
    pub analyte_id: String,
    pub variant: String,
    pub kept: f64,
    pub discarded: f64,
}

/// Canonicalize ids and keep the first value per canonical id.
///
/// A later value that differs from the kept one by more than
/// [`DUPLICATE_EPSILON`] is logged and dropped.
pub fn deduplicate(values: Vec<AnalyteValue>) -> Vec<AnalyteValue> {
    let (kept, conflicts) = merge_duplicates(values);
    for conflict in &conflicts {
        tracing::warn!(
            analyte = %conflict.analyte_id,
            variant = %conflict.variant,
            kept = conflict.kept,
            discarded = conflict.discarded,
            "Conflicting duplicate analyte value, keeping first"
        );
    }
    kept
}

/// Keep-first merge by canonical id, reporting disagreeing duplicates.
pub fn merge_duplicates(
    values: Vec<AnalyteValue>,
) -> (Vec<AnalyteValue>, Vec<DuplicateConflict>) {
    let mut kept: Vec<AnalyteValue> = Vec::with_capacity(values.len());
    let mut conflicts = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for value in values {
        let canonical = canonical_id(&value.analyte_id);
        match index.get(&canonical) {
            Some(&i) => {
                let first = kept[i].value;
                if (first - value.value).abs() > DUPLICATE_EPSILON {
                    conflicts.push(DuplicateConflict {
                        analyte_id: canonical,
                        variant: value.analyte_id,
                        kept: first,
                        discarded: value.value,
                    });
                }
            }
            None => {
                index.insert(canonical.clone(), kept.len());
                kept.push(AnalyteValue {
                    analyte_id: canonical,
                    value: value.value,
                });
            }
        }
    }

    (kept, conflicts)
}
