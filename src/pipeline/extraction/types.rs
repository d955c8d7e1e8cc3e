use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// How the document text was obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PdfDirect,
    TesseractOcr,
}

/// Per-page extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
}

/// Best-effort text acquired from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredText {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: usize,
    /// Pages whose text came from OCR
    pub ocr_pages: Vec<usize>,
}

/// One OCR attempt: a Tesseract page-segmentation mode and a language set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSettings {
    pub psm: u8,
    pub lang: String,
}

impl OcrSettings {
    pub fn new(psm: u8, lang: &str) -> Self {
        Self {
            psm,
            lang: lang.to_string(),
        }
    }
}

/// Tunables for text acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Below this many characters of direct text, the OCR sweep runs.
    pub min_direct_text_len: usize,
    /// Rasterization zoom factors tried per page, in order.
    pub zoom_factors: Vec<f32>,
    /// OCR configurations tried per rendered page.
    pub ocr_settings: Vec<OcrSettings>,
    /// Rendered page images are capped to this many pixels per side.
    pub max_render_dimension: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_direct_text_len: 50,
            zoom_factors: vec![2.0, 3.0, 4.0],
            ocr_settings: vec![
                OcrSettings::new(6, "por"),
                OcrSettings::new(4, "por"),
                OcrSettings::new(3, "por+eng"),
                OcrSettings::new(6, "eng"),
            ],
            max_render_dimension: 4096,
        }
    }
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    fn recognize(&self, image: &GrayImage, settings: &OcrSettings)
        -> Result<String, ExtractionError>;

    /// Clockwise rotation in degrees (0, 90, 180 or 270) needed to make the
    /// page upright.
    fn detect_rotation(&self, _image: &GrayImage) -> Result<u32, ExtractionError> {
        Ok(0)
    }

    /// Whether a language set can be used by this engine.
    fn supports_lang(&self, _lang: &str) -> bool {
        true
    }
}

/// PDF text-layer extraction abstraction.
///
/// Implementations validate the document structure before reading any page.
pub trait PdfExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError>;
}

/// Rasterizes PDF pages for the OCR path
pub trait PdfPageRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Render page `page_index` (zero-based) scaled by `zoom`, with neither
    /// side exceeding `max_dimension` pixels.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        zoom: f32,
        max_dimension: u32,
    ) -> Result<DynamicImage, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_sweeps_three_zoom_levels() {
        let config = ExtractionConfig::default();
        assert_eq!(config.min_direct_text_len, 50);
        assert_eq!(config.zoom_factors, vec![2.0, 3.0, 4.0]);
        assert!(!config.ocr_settings.is_empty());
        assert!(config.ocr_settings.iter().any(|s| s.lang.contains("por")));
    }
}
