pub mod normalize;
pub mod extractor;
pub mod numeric;
pub mod identifiers;

pub use extractor::extract_captures;
pub use identifiers::{
    canonical_id, deduplicate, display_name, merge_duplicates, DuplicateConflict,
};
pub use normalize::normalize_text;
pub use numeric::{disambiguate, ConversionError, NumericClass};

use crate::models::{AnalyteValue, PatternRule, RawCapture};

/// Convert raw captures to numbers. Unparseable captures are logged and dropped.
pub fn convert_captures(captures: Vec<RawCapture>) -> Vec<AnalyteValue> {
    captures
        .into_iter()
        .filter_map(|capture| {
            let class = NumericClass::for_analyte(&canonical_id(&capture.analyte_id));
            match disambiguate(class, &capture.analyte_id, &capture.raw_value) {
                Ok(value) => Some(AnalyteValue {
                    analyte_id: capture.analyte_id,
                    value,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unparseable capture");
                    None
                }
            }
        })
        .collect()
}

/// Normalize text, run the pattern table, convert and deduplicate.
///
/// Returns at most one value per canonical analyte, in first-capture order.
pub fn parse_report(text: &str, patterns: &[PatternRule]) -> Vec<AnalyteValue> {
    let normalized = normalize_text(text);
    let captures = extract_captures(&normalized, patterns);
    let capture_count = captures.len();
    let values = deduplicate(convert_captures(captures));

    tracing::info!(
        patterns = patterns.len(),
        captures = capture_count,
        analytes = values.len(),
        "Analyte extraction complete"
    );
    values
}
