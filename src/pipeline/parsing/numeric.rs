//! Thousands-vs-decimal separator resolution for captured numbers.
//!
//! Brazilian reports write `6.970` for six thousand nine hundred seventy and
//! `14,6` for fourteen point six. Whether a `.` is a thousands separator
//! depends on the analyte's expected range, so the decision is per class.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("cannot read {raw:?} as a number for {analyte}")]
    Unparseable { analyte: String, raw: String },
}

/// How separators in an analyte's raw value are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericClass {
    /// Platelet counts: both `.` and `,` may be thousands separators.
    Platelet,
    /// White-cell totals and differential absolute counts.
    Count,
    /// Everything else: `,` is the decimal mark.
    Decimal,
}

impl NumericClass {
    /// Class for a canonical analyte identifier.
    pub fn for_analyte(canonical_id: &str) -> Self {
        match canonical_id {
            "plaquetas" => Self::Platelet,
            "leucocitos" | "neutrofilos" | "linfocitos" => Self::Count,
            _ => Self::Decimal,
        }
    }

    pub fn is_count_style(self) -> bool {
        matches!(self, Self::Platelet | Self::Count)
    }
}

/// A `.` followed by exactly three digits.
static THOUSANDS_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d{3}(?:\D|$)").expect("valid regex"));

/// Resolve separators and parse. Deterministic for a given input pair.
pub fn disambiguate(
    class: NumericClass,
    analyte: &str,
    raw: &str,
) -> Result<f64, ConversionError> {
    let trimmed = raw.trim();

    let resolved = if class.is_count_style()
        && !trimmed.contains(',')
        && THOUSANDS_DOT.is_match(trimmed)
    {
        trimmed.replace('.', "")
    } else if class == NumericClass::Platelet && trimmed.contains(',') {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    };
    let resolved = resolved.replace(',', ".");

    match resolved.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ConversionError::Unparseable {
            analyte: analyte.to_string(),
            raw: raw.to_string(),
        }),
    }
}
