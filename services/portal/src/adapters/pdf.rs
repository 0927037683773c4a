//! services/portal/src/adapters/pdf.rs
//!
//! This module contains the content-extraction adapter: PDF text-layer
//! extraction via PDFium. It implements the `TextExtractor` port from the
//! `core` crate.
//!
//! Extraction failure is never fatal to an upload — the pipeline degrades
//! to an empty text body — so every error here maps to a plain `PortError`.

use async_trait::async_trait;
use pdfium_render::prelude::*;
use studyhall_core::domain::ExtractedContent;
use studyhall_core::ports::{PortError, PortResult, TextExtractor};
use tracing::info;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A text extractor backed by PDFium's native text layer.
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn bind() -> PortResult<Pdfium> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| PortError::Unexpected(format!("PDFium unavailable: {}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================================
// `TextExtractor` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextExtractor for PdfExtractor {
    /// Reads every page's text layer in order and assembles one string with
    /// a boundary marker per page. The page count is the document's total
    /// regardless of per-page extraction success.
    async fn extract(&self, bytes: &[u8]) -> PortResult<ExtractedContent> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PortError::Unexpected(format!("Failed to parse PDF document: {}", e)))?;

        let page_texts: Vec<String> = document
            .pages()
            .iter()
            .map(|page| page.text().map(|t| t.all()).unwrap_or_default())
            .collect();
        let page_count = page_texts.len() as u32;

        info!(pages = page_count, "PDF text extraction complete.");
        Ok(ExtractedContent {
            text: assemble_pages(&page_texts),
            page_count,
        })
    }
}

/// Concatenates per-page text with a `--- Page N ---` boundary before each
/// page, pages numbered from 1.
pub fn assemble_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        text.push_str(&format!("\n--- Page {} ---\n{}", idx + 1, page));
    }
    text
}
