//! PDF classification for receipt ingestion.
//!
//! Text-bearing PDFs re-enter the text pipeline (which has a deterministic
//! fallback); image-only scans are handed to the vision model like any other
//! image.

use lopdf::Document;
use tracing::{info, warn};

/// Result of attempting to get usable text out of a PDF.
#[derive(Debug)]
pub enum PdfContent {
    /// The PDF carries extractable text.
    Text(String),
    /// Image-only / scanned pages; needs the vision model.
    Scanned,
    /// Not parseable as a PDF at all.
    Unreadable(String),
}

/// Minimum non-whitespace characters expected from a real text PDF; below
/// this the PDF is treated as scanned.
const MIN_EXTRACTED_CHARS: usize = 30;

/// Share of image-only pages at which the whole PDF counts as scanned.
const SCANNED_PAGE_RATIO: f64 = 0.8;

/// Classify PDF bytes and extract text when there is any.
pub fn classify_pdf(bytes: &[u8]) -> PdfContent {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => return PdfContent::Unreadable(format!("failed to parse PDF: {e}")),
    };

    if looks_like_scan(&doc) {
        info!("PDF structural check: image-only pages, treating as scan");
        return PdfContent::Scanned;
    }

    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_EXTRACTED_CHARS {
                info!(chars = meaningful, "Extracted text too short, treating as scan");
                PdfContent::Scanned
            } else {
                info!(chars = meaningful, "Text extracted from PDF");
                PdfContent::Text(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed, treating as scan");
            PdfContent::Scanned
        }
    }
}

/// A page with XObject images but no Font resources is almost certainly a
/// scan. When most pages look like that, the whole document does.
fn looks_like_scan(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // can't tell, let text extraction try
    }

    let image_only = pages
        .values()
        .filter(|object_id| {
            let Ok(page) = doc.get_object(**object_id) else {
                return false;
            };
            let Ok(page_dict) = page.as_dict() else {
                return false;
            };
            has_resource(doc, page_dict, b"XObject") && !has_resource(doc, page_dict, b"Font")
        })
        .count();

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        total_pages = pages.len(),
        image_only, "Scanned-page analysis"
    );
    ratio >= SCANNED_PAGE_RATIO
}

/// Whether the page's Resources dictionary holds a non-empty entry of the
/// given kind, following indirect references.
fn has_resource(doc: &Document, page_dict: &lopdf::Dictionary, kind: &[u8]) -> bool {
    page_dict
        .get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|resources| resources.get(kind).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_unreadable() {
        match classify_pdf(b"definitely not a pdf") {
            PdfContent::Unreadable(_) => {}
            other => panic!("expected unreadable, got {other:?}"),
        }
    }
}
