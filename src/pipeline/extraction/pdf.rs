use lopdf::Document;

use super::types::{PageExtraction, PdfExtractor};
use super::{ExtractionError, InvalidDocument};

/// Smallest buffer accepted as a PDF.
pub const MIN_PDF_BYTES: usize = 100;

const PDF_SIGNATURE: &[u8] = b"%PDF";

/// PDF text extractor using lopdf.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError> {
        let doc = validate_pdf(pdf_bytes)?;
        Ok(extract_pages(&doc))
    }
}

/// Structural validation: size, signature, encryption, page tree, first page.
pub fn validate_pdf(pdf_bytes: &[u8]) -> Result<Document, InvalidDocument> {
    if pdf_bytes.len() < MIN_PDF_BYTES {
        return Err(InvalidDocument::TooSmall {
            size: pdf_bytes.len(),
        });
    }
    if !pdf_bytes.starts_with(PDF_SIGNATURE) {
        return Err(InvalidDocument::BadSignature);
    }

    let doc = Document::load_mem(pdf_bytes).map_err(map_load_error)?;
    check_not_encrypted(&doc)?;
    check_first_page(&doc)?;
    Ok(doc)
}

fn check_not_encrypted(doc: &Document) -> Result<(), InvalidDocument> {
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(InvalidDocument::Encrypted);
    }
    Ok(())
}

fn check_first_page(doc: &Document) -> Result<(), InvalidDocument> {
    let pages = doc.get_pages();
    let (_, &first_id) = pages.iter().next().ok_or(InvalidDocument::NoPages)?;
    doc.get_dictionary(first_id)
        .map_err(|e| InvalidDocument::FirstPageUnreadable(e.to_string()))?;
    Ok(())
}

/// Map load errors, detecting encrypted PDFs for user-friendly messaging.
fn map_load_error(e: lopdf::Error) -> InvalidDocument {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") || lower.contains("decrypt") {
        InvalidDocument::Encrypted
    } else {
        InvalidDocument::Corrupted(msg)
    }
}

/// Extract the text layer of every page. A page whose content cannot be
/// decoded is skipped; the rest of the document is still read.
pub fn extract_pages(doc: &Document) -> Vec<PageExtraction> {
    let mut pages = Vec::new();
    for &page_number in doc.get_pages().keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => pages.push(PageExtraction {
                page_number: page_number as usize,
                text,
            }),
            Err(e) => {
                tracing::warn!(
                    page = page_number,
                    error = %e,
                    "Skipping page with unreadable text layer"
                );
            }
        }
    }
    pages
}

/// Join page texts with newlines, dropping pages without text.
pub fn join_pages(pages: &[PageExtraction]) -> String {
    pages
        .iter()
        .map(|p| p.text.trim_end())
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}


#[cfg(test)]
mod tests {
    use super::test_pdf::make_pdf;
    use super::*;

    #[test]
    fn rejects_tiny_buffer() {
        let err = validate_pdf(b"%PDF-1.4").unwrap_err();
        assert_eq!(err, InvalidDocument::TooSmall { size: 8 });
    }

    #[test]
    fn rejects_missing_signature() {
        let bytes = vec![b'x'; 200];
        assert_eq!(validate_pdf(&bytes).unwrap_err(), InvalidDocument::BadSignature);
    }

    #[test]
    fn rejects_corrupted_body() {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend(std::iter::repeat(b'#').take(200));
        assert!(matches!(
            validate_pdf(&bytes).unwrap_err(),
            InvalidDocument::Corrupted(_)
        ));
    }

    #[test]
    fn rejects_document_without_pages() {
        let bytes = make_pdf(&[]);
        assert!(bytes.len() >= MIN_PDF_BYTES);
        assert_eq!(validate_pdf(&bytes).unwrap_err(), InvalidDocument::NoPages);
    }

    #[test]
    fn rejects_encrypt_dictionary_in_trailer() {
        let mut doc = Document::with_version("1.4");
        doc.trailer.set(
            "Encrypt",
            lopdf::dictionary! { "Filter" => "Standard" },
        );
        assert_eq!(check_not_encrypted(&doc).unwrap_err(), InvalidDocument::Encrypted);
    }

    #[test]
    fn extracts_text_layer_per_page() {
        let bytes = make_pdf(&[
            &["Hemograma completo", "Hemoglobina 14,6 g/dL"],
            &["Plaquetas 282.000 /uL"],
        ]);
        let pages = PdfTextExtractor.extract_text(&bytes).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].text.contains("Hemoglobina"));
        assert!(pages[1].text.contains("Plaquetas"));
    }

    #[test]
    fn joined_text_separates_pages_with_newline() {
        let pages = vec![
            PageExtraction { page_number: 1, text: "first page\n".into() },
            PageExtraction { page_number: 2, text: "   ".into() },
            PageExtraction { page_number: 3, text: "third page".into() },
        ];
        assert_eq!(join_pages(&pages), "first page\nthird page");
    }

    #[test]
    fn invalid_pdf_surfaces_as_document_invalid() {
        let result = PdfTextExtractor.extract_text(b"not a pdf");
        assert!(matches!(
            result,
            Err(ExtractionError::DocumentInvalid(InvalidDocument::TooSmall { .. }))
        ));
    }
}
