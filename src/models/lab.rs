use serde::{Deserialize, Serialize};

use super::enums::Classification;

/// One successful pattern match, before numeric normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    pub analyte_id: String,
    pub raw_value: String,
}

/// A numeric analyte value keyed by its canonical identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteValue {
    pub analyte_id: String,
    pub value: f64,
}

/// An abnormal analyte result enriched with guideline metadata.
///
/// Normal values never become findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub analyte_id: String,
    pub display_name: String,
    pub value: f64,
    pub classification: Classification,
    pub severity: u32,
    /// Comma-joined list of specialties, e.g. `"Hematologia, Clínico"`.
    pub specialty: String,
    pub description: String,
    pub guideline: String,
}

impl Finding {
    /// Individual specialty names, trimmed, empties dropped.
    pub fn specialties(&self) -> impl Iterator<Item = &str> {
        self.specialty
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialties_split_and_trim() {
        let finding = Finding {
            analyte_id: "hemoglobina".into(),
            display_name: "Hemoglobina".into(),
            value: 10.5,
            classification: Classification::Low,
            severity: 2,
            specialty: " Hematologia ,Clínico, ".into(),
            description: "Anemia".into(),
            guideline: "SBHH".into(),
        };
        let names: Vec<&str> = finding.specialties().collect();
        assert_eq!(names, vec!["Hematologia", "Clínico"]);
    }
}
