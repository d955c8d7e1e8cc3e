use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::enums::SexBand;

/// One row of the pattern table: which analyte a regex targets and which
/// capture group holds the numeric value.
///
/// Several rules may share an analyte (phrasing variants for OCR robustness).
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub analyte_id: String,
    pub pattern: Regex,
    pub capture_group: usize,
}

impl PatternRule {
    /// Compile `pattern` case-insensitive with `.` matching newlines.
    pub fn compile(
        analyte_id: &str,
        pattern: &str,
        capture_group: usize,
    ) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;
        Ok(Self {
            analyte_id: analyte_id.to_string(),
            pattern,
            capture_group,
        })
    }
}

/// One age/sex-scoped reference band for an analyte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineRule {
    pub analyte_id: String,
    pub sex: SexBand,
    pub age_min: i32,
    pub age_max: i32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub severity_low: u32,
    pub severity_high: u32,
    pub specialty: String,
    pub finding_description: String,
    pub guideline_reference: String,
}

impl GuidelineRule {
    pub fn covers_age(&self, age: i32) -> bool {
        self.age_min <= age && age <= self.age_max
    }
}
