//! End-to-end interpretation of a lab report:
//! acquire text → parse analytes → evaluate bands → rank specialties.

use std::path::Path;

use serde::Serialize;

use crate::models::{AnalyteValue, Finding, PatientSex};
use crate::pipeline::extraction::{DocumentExtractor, ExtractionError, ExtractionMethod};
use crate::pipeline::parsing::parse_report;
use crate::pipeline::rules::{evaluate_all, rank_specialties, DEFAULT_TOP_N};
use crate::reference::{GuidelineTable, PatternTable, ReferenceError};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Reference tables unavailable: {0}")]
    Reference(#[from] ReferenceError),
}

/// Result of interpreting one report.
#[derive(Debug, Clone, Serialize)]
pub struct LabInterpretation {
    /// Canonical analyte values found in the text, in first-capture order.
    pub values: Vec<AnalyteValue>,
    /// Abnormal values only.
    pub findings: Vec<Finding>,
    pub specialties: Vec<String>,
    /// `None` when the text was supplied directly.
    pub extraction_method: Option<ExtractionMethod>,
}

/// Holds the immutable tables and the text extractor; safe to share
/// across concurrent requests.
pub struct LabReportProcessor {
    patterns: PatternTable,
    guidelines: GuidelineTable,
    extractor: DocumentExtractor,
    top_n: usize,
}

impl LabReportProcessor {
    pub fn new(
        patterns: PatternTable,
        guidelines: GuidelineTable,
        extractor: DocumentExtractor,
    ) -> Self {
        Self {
            patterns,
            guidelines,
            extractor,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Load both tables from CSV. Fails if either is missing or malformed.
    pub fn from_files(
        patterns_path: &Path,
        guidelines_path: &Path,
        extractor: DocumentExtractor,
    ) -> Result<Self, ProcessingError> {
        let patterns = PatternTable::load(patterns_path)?;
        let guidelines = GuidelineTable::load(guidelines_path)?;
        Ok(Self::new(patterns, guidelines, extractor))
    }

    /// Number of specialties recommended.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Interpret a PDF report.
    ///
    /// Fails only when the document is invalid or yields no text; missing
    /// analytes, unparseable captures and analytes without a reference band
    /// shrink the result instead.
    pub fn process(
        &self,
        pdf_bytes: &[u8],
        sex: PatientSex,
        age: i32,
    ) -> Result<LabInterpretation, ProcessingError> {
        tracing::info!(bytes = pdf_bytes.len(), sex = ?sex, age, "Processing lab report");

        let acquired = self.extractor.acquire(pdf_bytes)?;
        let mut interpretation = self.process_text(&acquired.text, sex, age);
        interpretation.extraction_method = Some(acquired.method);
        Ok(interpretation)
    }

    /// Interpret already-acquired report text.
    pub fn process_text(&self, text: &str, sex: PatientSex, age: i32) -> LabInterpretation {
        let values = parse_report(text, self.patterns.rules());
        let findings = evaluate_all(&values, age, sex, self.guidelines.rules());
        let specialties = rank_specialties(&findings, self.top_n);

        tracing::info!(
            values = values.len(),
            findings = findings.len(),
            specialties = ?specialties,
            "Lab report interpreted"
        );

        LabInterpretation {
            values,
            findings,
            specialties,
            extraction_method: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, GuidelineRule, PatternRule, SexBand};
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdf::test_pdf::{make_pdf, BLANK_PAGE};
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;
    use crate::pipeline::extraction::PdfTextExtractor;

    fn patterns() -> PatternTable {
        PatternTable::from_rules(vec![
            PatternRule::compile("hemoglobina", r"Hemoglobina\s+([0-9]+,[0-9]+)", 1).unwrap(),
            PatternRule::compile("leucocitos", r"Leuc[oó]citos\s+[0-9]+%\s+([0-9.]+)", 1)
                .unwrap(),
            PatternRule::compile("plaquetas", r"Plaquetas\s+([0-9.]+)", 1).unwrap(),
            PatternRule::compile("plaquetas_alt", r"Plaquetas.*?([0-9.]+)\s*/μL", 1).unwrap(),
        ])
    }

    fn rule(
        analyte: &str,
        sex: SexBand,
        bounds: (f64, f64),
        severity_low: u32,
        specialty: &str,
    ) -> GuidelineRule {
        GuidelineRule {
            analyte_id: analyte.into(),
            sex,
            age_min: 18,
            age_max: 59,
            lower_bound: bounds.0,
            upper_bound: bounds.1,
            severity_low,
            severity_high: 1,
            specialty: specialty.into(),
            finding_description: format!("{analyte} fora da faixa"),
            guideline_reference: "SBHH".into(),
        }
    }

    fn guidelines() -> GuidelineTable {
        GuidelineTable::from_rules(vec![
            rule("hemoglobina", SexBand::Any, (12.0, 17.0), 1, "Clínico"),
            rule("hemoglobina", SexBand::Male, (13.0, 17.5), 3, "Hematologia, Clínico"),
            rule("leucocitos", SexBand::Any, (4000.0, 11000.0), 2, "Hematologia"),
            rule("plaquetas", SexBand::Any, (150000.0, 450000.0), 2, "Hematologia"),
        ])
    }

    fn processor(ocr_text: &str) -> LabReportProcessor {
        let extractor = DocumentExtractor::new(Box::new(PdfTextExtractor))
            .with_ocr_engine(Box::new(MockOcrEngine::new(ocr_text)))
            .with_pdf_renderer(Box::new(MockPdfPageRenderer::new(1)));
        LabReportProcessor::new(patterns(), guidelines(), extractor)
    }

    #[test]
    fn digital_report_end_to_end() {
        let pdf = make_pdf(&[&[
            "HEMOGRAMA COMPLETO",
            "Hemoglobina 10,5 g/dL",
            "Leucocitos 100 % 6.970 /uL",
            "Plaquetas 120.000 /uL",
        ]]);
        let result = processor("").process(&pdf, PatientSex::Masculino, 30).unwrap();

        assert_eq!(result.extraction_method, Some(ExtractionMethod::PdfDirect));
        assert_eq!(result.values.len(), 3);
        assert!(result
            .values
            .iter()
            .any(|v| v.analyte_id == "leucocitos" && v.value == 6970.0));

        assert_eq!(result.findings.len(), 2);
        let hb = &result.findings[0];
        assert_eq!(hb.analyte_id, "hemoglobina");
        assert_eq!(hb.classification, Classification::Low);
        assert_eq!(hb.severity, 3);
        assert_eq!(result.findings[1].analyte_id, "plaquetas");

        assert_eq!(result.specialties, vec!["Hematologia", "Clínico"]);
    }

    #[test]
    fn scanned_report_uses_ocr_text() {
        let pdf = make_pdf(&[BLANK_PAGE]);
        let ocr = "H e m o g l o b i n a 10 , 5 g/dL\nPlaquetas 282 . 000 /µL";
        let result = processor(ocr).process(&pdf, PatientSex::Feminino, 40).unwrap();

        assert_eq!(result.extraction_method, Some(ExtractionMethod::TesseractOcr));
        // No female band: only the Todos hemoglobin band applies.
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].severity, 1);
        assert_eq!(result.specialties, vec!["Clínico"]);
        assert!(result
            .values
            .iter()
            .any(|v| v.analyte_id == "plaquetas" && v.value == 282000.0));
    }

    #[test]
    fn blank_document_with_empty_ocr_is_an_error() {
        let pdf = make_pdf(&[BLANK_PAGE]);
        let err = processor("").process(&pdf, PatientSex::Masculino, 30).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Extraction(ExtractionError::TextExtractionFailed(_))
        ));
    }

    #[test]
    fn text_without_analytes_is_an_empty_result() {
        let result = processor("").process_text("Laudo sem hemograma", PatientSex::Unspecified, 30);
        assert!(result.values.is_empty());
        assert!(result.findings.is_empty());
        assert!(result.specialties.is_empty());
        assert_eq!(result.extraction_method, None);
    }

    #[test]
    fn top_n_limits_specialties() {
        let result = processor("")
            .with_top_n(1)
            .process_text("Hemoglobina 10,5\nPlaquetas 120.000", PatientSex::Masculino, 30);
        assert_eq!(result.specialties, vec!["Hematologia"]);
    }

    const SAMPLE_HEMOGRAM: &str = "HEMOGRAMA COMPLETO\n\
        Eritrócitos 4,43 milhões/mm³\n\
        Hemoglobina 14,6 g/dL\n\
        Hematócrito 42,6 %\n\
        VCM 96,2 fL\n\
        HCM 33,0 pg\n\
        CHCM 34,3 g/dL\n\
        RDW 11,8 %\n\
        Leucócitos 100 % 6.970 /µL\n\
        Neutrófilos 50,9 % 3.548 /µL\n\
        Eosinófilos 11,5 % 802 /µL\n\
        Basófilos 0,5 % 35 /µL\n\
        Linfócitos 31,8 % 2.216 /µL\n\
        Monócitos 5,3 % 369 /µL\n\
        Plaquetas\n\
        Contagem de plaquetas 282.000 /µL";

    fn bundled_processor() -> LabReportProcessor {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources");
        LabReportProcessor::from_files(
            &dir.join(crate::config::PATTERNS_FILE),
            &dir.join(crate::config::GUIDELINES_FILE),
            DocumentExtractor::new(Box::new(PdfTextExtractor)),
        )
        .unwrap()
    }

    #[test]
    fn bundled_tables_read_sample_hemogram() {
        let result =
            bundled_processor().process_text(SAMPLE_HEMOGRAM, PatientSex::Masculino, 35);

        assert_eq!(result.values.len(), 14);
        let value = |id: &str| {
            result
                .values
                .iter()
                .find(|v| v.analyte_id == id)
                .map(|v| v.value)
        };
        assert_eq!(value("eritrocitos"), Some(4.43));
        assert_eq!(value("hcm"), Some(33.0));
        assert_eq!(value("chcm"), Some(34.3));
        assert_eq!(value("leucocitos"), Some(6970.0));
        assert_eq!(value("eosinofilos"), Some(802.0));
        assert_eq!(value("basofilos"), Some(35.0));
        assert_eq!(value("plaquetas"), Some(282000.0));

        let flagged: Vec<_> = result.findings.iter().map(|f| f.analyte_id.as_str()).collect();
        assert_eq!(flagged, vec!["eritrocitos", "eosinofilos"]);
        assert_eq!(
            result.specialties,
            vec!["Hematologia", "Clínica Médica", "Alergia e Imunologia"]
        );
    }

    #[test]
    fn bundled_tables_use_female_bands() {
        let result =
            bundled_processor().process_text(SAMPLE_HEMOGRAM, PatientSex::Feminino, 35);
        let flagged: Vec<_> = result.findings.iter().map(|f| f.analyte_id.as_str()).collect();
        assert_eq!(flagged, vec!["eosinofilos"]);
        assert_eq!(result.specialties, vec!["Alergia e Imunologia", "Hematologia"]);
    }

    #[test]
    fn missing_tables_fail_construction() {
        let extractor = DocumentExtractor::new(Box::new(PdfTextExtractor));
        let result = LabReportProcessor::from_files(
            Path::new("/nonexistent/patterns.csv"),
            Path::new("/nonexistent/guideline_map.csv"),
            extractor,
        );
        assert!(matches!(
            result,
            Err(ProcessingError::Reference(ReferenceError::ConfigurationMissing { .. }))
        ));
    }
}
