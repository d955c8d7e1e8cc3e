use image::GrayImage;

use super::confidence::score_ocr_text;
use super::ocr::TesseractCli;
use super::pdf::{join_pages, PdfTextExtractor};
use super::pdfium::PdfiumRenderer;
use super::preprocess::{prepare_for_ocr, rotate_quarter};
use super::types::{
    AcquiredText, ExtractionConfig, ExtractionMethod, OcrEngine, PdfExtractor, PdfPageRenderer,
};
use super::ExtractionError;

/// Text acquisition: direct text layer first, OCR sweep when that is too short.
/// Uses trait objects for OCR, rendering and PDF parsing, enabling dependency injection.
pub struct DocumentExtractor {
    pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
    ocr_engine: Option<Box<dyn OcrEngine + Send + Sync>>,
    pdf_renderer: Option<Box<dyn PdfPageRenderer + Send + Sync>>,
    config: ExtractionConfig,
}

/// Winning OCR output for one page.
struct PageOcr {
    text: String,
    score: f32,
    zoom: f32,
}

impl DocumentExtractor {
    pub fn new(pdf_extractor: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        Self {
            pdf_extractor,
            ocr_engine: None,
            pdf_renderer: None,
            config: ExtractionConfig::default(),
        }
    }

    /// Extractor backed by lopdf, with Tesseract and PDFium when installed.
    pub fn with_system_tools(config: ExtractionConfig) -> Self {
        let mut extractor = Self::new(Box::new(PdfTextExtractor)).with_config(config);
        if let Some(tesseract) = TesseractCli::discover() {
            extractor = extractor.with_ocr_engine(Box::new(tesseract));
        }
        match PdfiumRenderer::new() {
            Ok(renderer) => extractor = extractor.with_pdf_renderer(Box::new(renderer)),
            Err(e) => tracing::warn!(error = %e, "PDF rasterization unavailable, OCR fallback disabled"),
        }
        extractor
    }

    pub fn with_ocr_engine(mut self, engine: Box<dyn OcrEngine + Send + Sync>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    /// Add a PDF page renderer for per-page OCR of scanned PDFs.
    pub fn with_pdf_renderer(mut self, renderer: Box<dyn PdfPageRenderer + Send + Sync>) -> Self {
        self.pdf_renderer = Some(renderer);
        self
    }

    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether scanned documents can be read.
    pub fn ocr_available(&self) -> bool {
        self.ocr_engine.is_some() && self.pdf_renderer.is_some()
    }

    /// Acquire the best available text for a PDF.
    pub fn acquire(&self, pdf_bytes: &[u8]) -> Result<AcquiredText, ExtractionError> {
        let pages = self.pdf_extractor.extract_text(pdf_bytes)?;
        let direct_text = join_pages(&pages);
        let direct_len = direct_text.trim().chars().count();

        if direct_len >= self.config.min_direct_text_len {
            tracing::info!(
                pages = pages.len(),
                chars = direct_len,
                "Text layer extraction complete"
            );
            return Ok(AcquiredText {
                text: direct_text,
                method: ExtractionMethod::PdfDirect,
                page_count: pages.len(),
                ocr_pages: Vec::new(),
            });
        }

        let (ocr_engine, renderer) = match (&self.ocr_engine, &self.pdf_renderer) {
            (Some(ocr), Some(renderer)) => (&**ocr, &**renderer),
            _ => {
                return Err(ExtractionError::TextExtractionFailed(format!(
                    "text layer has {direct_len} characters (minimum {}) and OCR is unavailable",
                    self.config.min_direct_text_len
                )));
            }
        };

        tracing::info!(
            chars = direct_len,
            threshold = self.config.min_direct_text_len,
            "Text layer insufficient, starting OCR sweep"
        );

        let page_count = match renderer.page_count(pdf_bytes) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "Renderer could not count pages, using text layer count");
                pages.len()
            }
        };

        let mut ocr_texts = Vec::new();
        let mut ocr_pages = Vec::new();
        for page_index in 0..page_count {
            if let Some(best) = self.ocr_page(pdf_bytes, page_index, ocr_engine, renderer) {
                tracing::debug!(
                    page = page_index + 1,
                    score = best.score,
                    zoom = best.zoom,
                    "Best OCR result selected"
                );
                ocr_texts.push(best.text.trim_end().to_string());
                ocr_pages.push(page_index + 1);
            }
        }

        let ocr_text = ocr_texts.join("\n");
        let ocr_len = ocr_text.trim().chars().count();

        if ocr_len == 0 && direct_len == 0 {
            return Err(ExtractionError::TextExtractionFailed(
                "no text from the text layer or OCR".into(),
            ));
        }

        if ocr_len < direct_len {
            tracing::info!(
                ocr_chars = ocr_len,
                direct_chars = direct_len,
                "OCR produced less text than the text layer, keeping text layer"
            );
            return Ok(AcquiredText {
                text: direct_text,
                method: ExtractionMethod::PdfDirect,
                page_count,
                ocr_pages: Vec::new(),
            });
        }

        tracing::info!(
            pages = page_count,
            ocr_pages = ocr_pages.len(),
            chars = ocr_len,
            "OCR extraction complete"
        );
        Ok(AcquiredText {
            text: ocr_text,
            method: ExtractionMethod::TesseractOcr,
            page_count,
            ocr_pages,
        })
    }

    /// Exhaustive zoom × configuration sweep for one page. Failures of a
    /// single render or configuration are logged and skipped.
    fn ocr_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        ocr_engine: &(dyn OcrEngine + Send + Sync),
        renderer: &(dyn PdfPageRenderer + Send + Sync),
    ) -> Option<PageOcr> {
        let mut best: Option<PageOcr> = None;

        for &zoom in &self.config.zoom_factors {
            let rendered = match renderer.render_page(
                pdf_bytes,
                page_index,
                zoom,
                self.config.max_render_dimension,
            ) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(page = page_index + 1, zoom, error = %e, "Page render failed");
                    continue;
                }
            };

            let prepared = orient_upright(prepare_for_ocr(&rendered), ocr_engine, page_index);

            for settings in &self.config.ocr_settings {
                if !ocr_engine.supports_lang(&settings.lang) {
                    tracing::debug!(lang = %settings.lang, "Language not installed, skipping");
                    continue;
                }
                let text = match ocr_engine.recognize(&prepared, settings) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(
                            page = page_index + 1,
                            zoom,
                            psm = settings.psm,
                            lang = %settings.lang,
                            error = %e,
                            "OCR configuration failed"
                        );
                        continue;
                    }
                };

                let score = score_ocr_text(&text);
                tracing::debug!(
                    page = page_index + 1,
                    zoom,
                    psm = settings.psm,
                    lang = %settings.lang,
                    score,
                    "OCR configuration scored"
                );

                let improves = match &best {
                    Some(current) => score > current.score,
                    None => score > 0.0,
                };
                if improves {
                    best = Some(PageOcr { text, score, zoom });
                }
            }
        }

        best
    }
}

fn orient_upright(
    image: GrayImage,
    ocr_engine: &(dyn OcrEngine + Send + Sync),
    page_index: usize,
) -> GrayImage {
    match ocr_engine.detect_rotation(&image) {
        Ok(0) => image,
        Ok(degrees) => {
            tracing::debug!(page = page_index + 1, degrees, "Correcting page orientation");
            rotate_quarter(&image, degrees)
        }
        Err(e) => {
            tracing::debug!(page = page_index + 1, error = %e, "Orientation detection failed");
            image
        }
    }
}
