use crate::quality::PdfProfile;
use crate::types::*;
use lopdf::{Document as PdfDocument, Object};

pub const PDF_MIME_TYPES: &[&str] = &["application/pdf"];

/// Catalog and page keys that carry no rendering information.
const CATALOG_METADATA_KEYS: &[&[u8]] = &[b"Metadata", b"PieceInfo"];
const PAGE_METADATA_KEYS: &[&[u8]] = &[b"Thumb", b"PieceInfo", b"Metadata"];

#[derive(Debug, Clone)]
pub struct OptimizedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Applies the structural optimizations in `profile` and re-serializes the document.
    pub fn optimize(&self, content: &[u8], profile: PdfProfile) -> Result<OptimizedPdf, CompressionError> {
        let mut doc = PdfDocument::load_mem(content)
            .map_err(|e| CompressionError::Pdf(format!("Failed to load PDF: {}", e)))?;
        let page_count = doc.get_pages().len();

        if profile.strip_metadata {
            self.strip_metadata(&mut doc);
        }

        if profile.drop_empty_streams {
            let removed = doc.delete_zero_length_streams();
            log::debug!("Dropped {} empty streams", removed.len());
        }

        if profile.prune_unused_objects {
            self.remove_unused_objects(&mut doc);
        }

        if profile.compress_streams {
            doc.compress();
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| CompressionError::Pdf(format!("Failed to save optimized PDF: {}", e)))?;

        log::info!(
            "PDF optimized ({} pages): {} -> {} bytes",
            page_count,
            content.len(),
            output.len()
        );

        Ok(OptimizedPdf {
            bytes: output,
            page_count,
        })
    }

    fn remove_unused_objects(&self, doc: &mut PdfDocument) {
        let pruned = doc.prune_objects();
        log::debug!("Pruned {} unreferenced objects", pruned.len());
        doc.renumber_objects();
    }

    /// Drops the document info dictionary, XMP metadata and page thumbnails.
    fn strip_metadata(&self, doc: &mut PdfDocument) {
        doc.trailer.remove(b"Info");

        if let Ok(root_id) = doc.trailer.get(b"Root").and_then(Object::as_reference) {
            if let Ok(catalog) = doc.get_object_mut(root_id).and_then(Object::as_dict_mut) {
                for key in CATALOG_METADATA_KEYS {
                    catalog.remove(key);
                }
            }
        }

        let page_ids: Vec<_> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
                for key in PAGE_METADATA_KEYS {
                    page.remove(key);
                }
            }
        }
    }
}
