use crate::error::{CoreError, CoreResult};
use std::path::Path;

use super::model::ExtractedDocument;

/// Turns a source file into text. Failures are per-document; callers log and
/// continue with the remaining documents.
pub trait DocumentExtractor {
    fn extract(&self, path: &Path) -> CoreResult<ExtractedDocument>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> CoreResult<ExtractedDocument> {
        let bytes = std::fs::read(path).map_err(|e| extraction_failed(path, e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| extraction_failed(path, "file is not valid UTF-8".to_string()))?;
        Ok(ExtractedDocument::from_text(source_key(path), text))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    #[cfg(feature = "pdf")]
    fn extract(&self, path: &Path) -> CoreResult<ExtractedDocument> {
        let text = pdf_extract::extract_text(path)
            .map_err(|e| extraction_failed(path, e.to_string()))?;
        if text.trim().is_empty() {
            return Err(extraction_failed(path, "no text found in PDF".to_string()));
        }
        Ok(ExtractedDocument::from_text(source_key(path), text))
    }

    #[cfg(not(feature = "pdf"))]
    fn extract(&self, path: &Path) -> CoreResult<ExtractedDocument> {
        Err(extraction_failed(
            path,
            "PDF support not enabled (build with --features pdf)".to_string(),
        ))
    }
}

/// PDF for `.pdf` paths, plain text for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoExtractor;

impl DocumentExtractor for AutoExtractor {
    fn extract(&self, path: &Path) -> CoreResult<ExtractedDocument> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            PdfExtractor.extract(path)
        } else {
            PlainTextExtractor.extract(path)
        }
    }
}

/// Document keys are the path exactly as supplied by the caller.
pub fn source_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn extraction_failed(path: &Path, reason: String) -> CoreError {
    CoreError::DocumentExtractionFailed {
        source_key: source_key(path),
        reason,
    }
}
