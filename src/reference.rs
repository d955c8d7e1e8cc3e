//! Pattern and guideline tables.
//!
//! Both are loaded once at startup from CSV and are read-only afterwards.
//! A missing or malformed guideline table is fatal; the pattern table
//! tolerates individual bad rows but not an empty result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::ReaderBuilder;
use thiserror::Error;

use crate::models::{GuidelineRule, PatternRule, SexBand};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Reference table not found: {}", .path.display())]
    ConfigurationMissing { path: PathBuf },

    #[error("Failed to read CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid {field} '{value}' in {} line {line}", .file.display())]
    InvalidValue {
        field: String,
        value: String,
        file: PathBuf,
        line: u64,
    },

    #[error("Reference table {} has no usable rows", .path.display())]
    Empty { path: PathBuf },
}

/// One CSV row keyed by trimmed header, with its 1-based line number.
struct CsvRow {
    line: u64,
    fields: BTreeMap<String, String>,
}

impl CsvRow {
    /// First non-empty value among `keys` (header aliases).
    fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }
}

fn read_rows(path: &Path) -> Result<Vec<CsvRow>, ReferenceError> {
    if !path.is_file() {
        return Err(ReferenceError::ConfigurationMissing {
            path: path.to_path_buf(),
        });
    }
    let csv_err = |source| ReferenceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_matches('\u{feff}').trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let fields = headers
            .iter()
            .cloned()
            .zip(record.iter().map(|v| v.trim().to_string()))
            .collect();
        rows.push(CsvRow { line, fields });
    }
    Ok(rows)
}

/// Compiled pattern rules, in table order.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    rules: Vec<PatternRule>,
}

impl PatternTable {
    /// Load `analito,pattern,grupo_decimal` rows (`grupo` accepted for the
    /// last column). Rows with a missing field, a bad group or a regex that
    /// does not compile are logged and skipped.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let rows = read_rows(path)?;
        let mut rules = Vec::with_capacity(rows.len());

        for row in &rows {
            let (Some(analyte), Some(pattern), Some(group)) = (
                row.get(&["analito"]),
                row.get(&["pattern", "padrao"]),
                row.get(&["grupo_decimal", "grupo"]),
            ) else {
                tracing::warn!(line = row.line, "Pattern row missing a field, skipping");
                continue;
            };

            let group = match group.parse::<usize>() {
                Ok(g) if g > 0 => g,
                _ => {
                    tracing::warn!(
                        line = row.line,
                        analyte,
                        group,
                        "Pattern row has invalid capture group, skipping"
                    );
                    continue;
                }
            };

            match PatternRule::compile(analyte, pattern, group) {
                Ok(rule) if rule.pattern.captures_len() > group => rules.push(rule),
                Ok(_) => {
                    tracing::warn!(
                        line = row.line,
                        analyte,
                        group,
                        "Pattern has fewer capture groups than configured, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        line = row.line,
                        analyte,
                        error = %e,
                        "Pattern does not compile, skipping"
                    );
                }
            }
        }

        if rules.is_empty() {
            return Err(ReferenceError::Empty {
                path: path.to_path_buf(),
            });
        }

        tracing::info!(
            path = %path.display(),
            patterns = rules.len(),
            skipped = rows.len() - rules.len(),
            "Pattern table loaded"
        );
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Age/sex-banded reference ranges, in table order.
#[derive(Debug, Clone, Default)]
pub struct GuidelineTable {
    rules: Vec<GuidelineRule>,
}

impl GuidelineTable {
    /// Load the guideline map. Any malformed value is fatal.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let rows = read_rows(path)?;
        let rules = rows
            .iter()
            .map(|row| parse_guideline_row(row, path))
            .collect::<Result<Vec<_>, _>>()?;

        if rules.is_empty() {
            return Err(ReferenceError::Empty {
                path: path.to_path_buf(),
            });
        }

        tracing::info!(
            path = %path.display(),
            rules = rules.len(),
            "Guideline table loaded"
        );
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<GuidelineRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[GuidelineRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_guideline_row(row: &CsvRow, file: &Path) -> Result<GuidelineRule, ReferenceError> {
    let invalid = |field: &str, value: &str| ReferenceError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        file: file.to_path_buf(),
        line: row.line,
    };
    let text = |field: &str| -> Result<String, ReferenceError> {
        row.get(&[field])
            .map(str::to_string)
            .ok_or_else(|| invalid(field, ""))
    };
    fn number<T: FromStr>(
        value: String,
        field: &str,
        invalid: &dyn Fn(&str, &str) -> ReferenceError,
    ) -> Result<T, ReferenceError> {
        value.parse::<T>().map_err(|_| invalid(field, &value))
    }

    let sex_raw = text("sexo")?;
    let sex = SexBand::from_str(&sex_raw).map_err(|_| invalid("sexo", &sex_raw))?;

    let age_min: i32 = number(text("idade_min")?, "idade_min", &invalid)?;
    let age_max: i32 = number(text("idade_max")?, "idade_max", &invalid)?;
    if age_min > age_max {
        return Err(invalid("idade_max", &age_max.to_string()));
    }

    let lower_bound: f64 = number(text("limite_inferior")?, "limite_inferior", &invalid)?;
    let upper_bound: f64 = number(text("limite_superior")?, "limite_superior", &invalid)?;
    if !lower_bound.is_finite() || !upper_bound.is_finite() || lower_bound > upper_bound {
        return Err(invalid("limite_superior", &upper_bound.to_string()));
    }

    Ok(GuidelineRule {
        analyte_id: text("analito_id")?,
        sex,
        age_min,
        age_max,
        lower_bound,
        upper_bound,
        severity_low: number(text("severidade_baixa")?, "severidade_baixa", &invalid)?,
        severity_high: number(text("severidade_alta")?, "severidade_alta", &invalid)?,
        specialty: text("especialidade")?,
        finding_description: row.get(&["descricao_achado"]).unwrap_or_default().to_string(),
        guideline_reference: row.get(&["diretriz"]).unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const GUIDELINE_HEADER: &str = "analito_id,sexo,idade_min,idade_max,limite_inferior,limite_superior,severidade_baixa,severidade_alta,especialidade,descricao_achado,diretriz\n";

    #[test]
    fn missing_file_is_configuration_missing() {
        let err = PatternTable::load(Path::new("/nonexistent/patterns.csv")).unwrap_err();
        assert!(matches!(err, ReferenceError::ConfigurationMissing { .. }));
        let err = GuidelineTable::load(Path::new("/nonexistent/guideline_map.csv")).unwrap_err();
        assert!(matches!(err, ReferenceError::ConfigurationMissing { .. }));
    }

    #[test]
    fn pattern_table_skips_bad_rows() {
        let file = write_csv(
            "analito,pattern,grupo_decimal\n\
             hemoglobina,\"Hemoglobina\\s+([0-9]+,[0-9]+)\",1\n\
             broken,\"Leuc([0-9\",1\n\
             vcm,\"VCM\\s+([0-9,]+)\",0\n\
             rdw,\"RDW\\s+([0-9,]+)\",2\n\
             plaquetas,\"Plaquetas\\s+([0-9.]+)\",1\n",
        );
        let table = PatternTable::load(file.path()).unwrap();
        let ids: Vec<_> = table.rules().iter().map(|r| r.analyte_id.as_str()).collect();
        assert_eq!(ids, vec!["hemoglobina", "plaquetas"]);
    }

    #[test]
    fn pattern_table_accepts_grupo_header_and_bom() {
        let file = write_csv("\u{feff}analito,pattern,grupo\nrdw,\"RDW\\s+([0-9,]+)\",1\n");
        let table = PatternTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rules()[0].capture_group, 1);
    }

    #[test]
    fn pattern_table_without_usable_rows_is_empty() {
        let file = write_csv("analito,pattern,grupo_decimal\nbroken,\"(\",1\n");
        assert!(matches!(
            PatternTable::load(file.path()).unwrap_err(),
            ReferenceError::Empty { .. }
        ));
    }

    #[test]
    fn guideline_table_parses_rows() {
        let file = write_csv(&format!(
            "{GUIDELINE_HEADER}hemoglobina,M,18,59,13.0,17.5,2,1,\"Hematologia, Clínico\",Anemia,SBHH 2023\n\
             hemoglobina,Todos,0,120,12.0,17.0,1,1,Hematologia,Anemia,SBHH 2023\n"
        ));
        let table = GuidelineTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        let first = &table.rules()[0];
        assert_eq!(first.sex, SexBand::Male);
        assert_eq!((first.age_min, first.age_max), (18, 59));
        assert_eq!(first.lower_bound, 13.0);
        assert_eq!(first.severity_low, 2);
        assert_eq!(first.specialty, "Hematologia, Clínico");
        assert_eq!(table.rules()[1].sex, SexBand::Any);
    }

    #[test]
    fn guideline_table_rejects_bad_number() {
        let file = write_csv(&format!(
            "{GUIDELINE_HEADER}hemoglobina,M,18,cinquenta,13.0,17.5,2,1,Hematologia,Anemia,SBHH\n"
        ));
        match GuidelineTable::load(file.path()).unwrap_err() {
            ReferenceError::InvalidValue { field, value, line, .. } => {
                assert_eq!(field, "idade_max");
                assert_eq!(value, "cinquenta");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn guideline_table_rejects_unknown_sex_code() {
        let file = write_csv(&format!(
            "{GUIDELINE_HEADER}hemoglobina,X,18,59,13.0,17.5,2,1,Hematologia,Anemia,SBHH\n"
        ));
        assert!(matches!(
            GuidelineTable::load(file.path()).unwrap_err(),
            ReferenceError::InvalidValue { ref field, .. } if field == "sexo"
        ));
    }

    #[test]
    fn guideline_table_rejects_inverted_bounds() {
        let file = write_csv(&format!(
            "{GUIDELINE_HEADER}hemoglobina,M,18,59,17.5,13.0,2,1,Hematologia,Anemia,SBHH\n"
        ));
        assert!(matches!(
            GuidelineTable::load(file.path()).unwrap_err(),
            ReferenceError::InvalidValue { .. }
        ));
    }

    #[test]
    fn header_only_guideline_table_is_empty() {
        let file = write_csv(GUIDELINE_HEADER);
        assert!(matches!(
            GuidelineTable::load(file.path()).unwrap_err(),
            ReferenceError::Empty { .. }
        ));
    }
}
