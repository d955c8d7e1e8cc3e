//! Page rasterization for the OCR fallback, backed by PDFium.
//!
//! The upstream `Pdfium` handle is `!Send`, so every call binds the library
//! afresh and `PdfiumRenderer` itself carries no state.

use std::path::PathBuf;

use image::{DynamicImage, GrayImage, Luma};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Explicit path to the PDFium shared library.
pub const PDFIUM_PATH_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// PDFium-backed [`PdfPageRenderer`].
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Fails when no PDFium library can be bound.
    ///
    /// Looks at `PDFIUM_DYNAMIC_LIB_PATH` first, then next to the executable
    /// (and its `resources/pdfium/lib`), then the system search path.
    pub fn new() -> Result<Self, ExtractionError> {
        bind_pdfium()?;
        Ok(Self)
    }
}

/// Directories next to the running binary that may hold the library.
fn bundled_library_dirs() -> Vec<PathBuf> {
    let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
    else {
        return Vec::new();
    };
    let nested = exe_dir.join("resources").join("pdfium").join("lib");
    vec![exe_dir, nested]
}

fn bind_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var(PDFIUM_PATH_ENV) {
        debug!(path = %path, "Binding PDFium from {PDFIUM_PATH_ENV}");
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| {
                ExtractionError::OcrUnavailable(format!("cannot load PDFium at {path}: {e}"))
            });
    }

    for dir in bundled_library_dirs() {
        let candidate =
            Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            debug!(dir = %dir.display(), "Bound bundled PDFium");
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| {
            ExtractionError::OcrUnavailable(format!(
                "no PDFium library found (set {PDFIUM_PATH_ENV}): {e}"
            ))
        })
}

/// Open `pdf_bytes`; `page` only labels the error.
fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_bytes: &'a [u8],
    page: usize,
) -> Result<PdfDocument<'a>, ExtractionError> {
    pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| ExtractionError::PdfRendering {
            page,
            reason: format!("PDFium cannot open document: {e}"),
        })
}

/// Compute pixel dimensions for a page at `zoom`, capped to `max_dim`.
///
/// Returns (width_px, height_px), both clamped to [1, max_dim].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(
    width_points: f32,
    height_points: f32,
    zoom: f32,
    max_dim: u32,
) -> (u32, u32) {
    let raw_w = (width_points * zoom).max(1.0);
    let raw_h = (height_points * zoom).max(1.0);

    let largest = raw_w.max(raw_h);
    if largest > max_dim as f32 {
        let ratio = max_dim as f32 / largest;
        let w = ((raw_w * ratio) as u32).clamp(1, max_dim);
        let h = ((raw_h * ratio) as u32).clamp(1, max_dim);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, pdf_bytes, 0)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        zoom: f32,
        max_dimension: u32,
    ) -> Result<DynamicImage, ExtractionError> {
        let rendering_error = |reason: String| ExtractionError::PdfRendering {
            page: page_index,
            reason,
        };

        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, pdf_bytes, page_index)?;
        let pages = document.pages();
        let page = u16::try_from(page_index)
            .ok()
            .and_then(|index| pages.get(index).ok())
            .ok_or_else(|| {
                rendering_error(format!("no page {page_index} in {} pages", pages.len()))
            })?;

        let (points_w, points_h) = (page.width().value, page.height().value);
        let (target_w, target_h) =
            compute_render_dimensions(points_w, points_h, zoom, max_dimension);
        if (points_w * zoom) as u32 > target_w {
            warn!(page = page_index, zoom, target_w, target_h, max_dimension, "Render size capped");
        }

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(target_w as i32)
                    .set_maximum_height(target_h as i32),
            )
            .map_err(|e| rendering_error(format!("PDFium render failed: {e}")))?;

        debug!(page = page_index, zoom, target_w, target_h, "Page rasterized");

        Ok(bitmap.as_image())
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock renderer returning a blank 30×40-point page image scaled by the zoom
/// factor. Zoom factors marked with `with_failing_zoom` fail to render.
pub struct MockPdfPageRenderer {
    page_count: usize,
    failing_zooms: Vec<f32>,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            failing_zooms: Vec::new(),
        }
    }

    pub fn with_failing_zoom(mut self, zoom: f32) -> Self {
        self.failing_zooms.push(zoom);
        self
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        zoom: f32,
        max_dimension: u32,
    ) -> Result<DynamicImage, ExtractionError> {
        if page_index >= self.page_count {
            return Err(ExtractionError::PdfRendering {
                page: page_index,
                reason: format!(
                    "Page {page_index} out of range (mock has {} pages)",
                    self.page_count
                ),
            });
        }
        if self.failing_zooms.contains(&zoom) {
            return Err(ExtractionError::PdfRendering {
                page: page_index,
                reason: format!("mock failure at zoom {zoom}"),
            });
        }
        let (w, h) = compute_render_dimensions(30.0, 40.0, zoom, max_dimension);
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([255u8]))))
    }
}
