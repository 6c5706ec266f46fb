//! Document rasterisation: render page one of the certificate to a bitmap.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! Only the first page is rendered: the QR code sits on page one of every
//! certificate layout, and later pages repeat the tabular data the pipeline
//! scrapes from the web anyway.

use crate::config::ExtractConfig;
use crate::error::ExtractError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// The document to extract from — either bytes handed over by an upload
/// handler, or a path on the local filesystem.
///
/// Both carry a filename so the extension gate can reject non-PDF uploads
/// before any pdfium work happens.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Raw bytes plus the original filename.
    Bytes { name: String, data: Vec<u8> },
    /// Path to a file on disk.
    Path(PathBuf),
}

impl DocumentSource {
    /// The filename used for validation and error messages.
    pub fn name(&self) -> String {
        match self {
            DocumentSource::Bytes { name, .. } => name.clone(),
            DocumentSource::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
        }
    }

    /// Reject anything that is not named like a PDF.
    pub fn validate_extension(&self) -> Result<(), ExtractError> {
        let name = self.name();
        if name.to_ascii_lowercase().ends_with(".pdf") {
            Ok(())
        } else {
            Err(ExtractError::UnsupportedFormat { name })
        }
    }
}

/// Rasterise page one of the document at the configured DPI.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
pub async fn render_first_page(
    source: DocumentSource,
    config: &ExtractConfig,
) -> Result<DynamicImage, ExtractError> {
    source.validate_extension()?;
    let dpi = config.dpi;

    tokio::task::spawn_blocking(move || render_first_page_blocking(source, dpi))
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of first-page rendering.
fn render_first_page_blocking(
    source: DocumentSource,
    dpi: u32,
) -> Result<DynamicImage, ExtractError> {
    let name = source.name();
    let pdfium = Pdfium::default();

    let document = match &source {
        DocumentSource::Bytes { data, .. } => pdfium.load_pdf_from_byte_slice(data, None),
        DocumentSource::Path(path) => {
            if !path.exists() {
                return Err(ExtractError::FileNotFound { path: path.clone() });
            }
            pdfium.load_pdf_from_file(path, None)
        }
    }
    .map_err(|e| ExtractError::CorruptDocument {
        name: name.clone(),
        detail: format!("{:?}", e),
    })?;

    let page = document
        .pages()
        .get(0)
        .map_err(|e| ExtractError::CorruptDocument {
            name: name.clone(),
            detail: format!("document has no pages: {:?}", e),
        })?;

    // PDF points are 1/72 inch; scale page dimensions to pixels at `dpi`.
    let width_px = (page.width().value / 72.0 * dpi as f32).round() as i32;
    let height_px = (page.height().value / 72.0 * dpi as f32).round() as i32;

    let render_config = PdfRenderConfig::new()
        .set_target_width(width_px)
        .set_maximum_height(height_px);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| ExtractError::CorruptDocument {
            name: name.clone(),
            detail: format!("rasterisation failed: {:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page 1 of '{}' → {}x{} px at {} DPI",
        name,
        image.width(),
        image.height(),
        dpi
    );

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_gate_accepts_pdf_any_case() {
        let src = DocumentSource::Bytes {
            name: "Constancia.PDF".into(),
            data: vec![],
        };
        assert!(src.validate_extension().is_ok());
    }

    #[test]
    fn extension_gate_rejects_other_formats() {
        for name in ["scan.png", "constancia.pdf.exe", "archivo"] {
            let src = DocumentSource::Bytes {
                name: name.into(),
                data: vec![],
            };
            let err = src.validate_extension().unwrap_err();
            assert!(
                matches!(err, ExtractError::UnsupportedFormat { .. }),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn path_source_name_is_file_name() {
        let src = DocumentSource::Path(PathBuf::from("/tmp/docs/constancia.pdf"));
        assert_eq!(src.name(), "constancia.pdf");
        assert!(src.validate_extension().is_ok());
    }
}
