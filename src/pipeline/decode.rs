//! QR decoding: locate the certificate's QR code and read its payload URL.
//!
//! The certificate carries a QR code on page one whose payload is the
//! verification URL on the issuing authority's site. Zero detected codes is
//! a named error, never an index panic: blank scans and photocopied
//! certificates without a readable code are an everyday input here.

use crate::error::ExtractError;
use image::DynamicImage;
use tracing::debug;

/// Scan the rendered page for QR codes and return the first payload as an
/// ASCII URL string.
///
/// The payload must decode as ASCII — the authority encodes plain `https`
/// URLs — so anything else is reported as [`ExtractError::QrPayloadNotText`]
/// rather than passed to the browser.
pub fn decode_qr_url(image: &DynamicImage, doc_name: &str) -> Result<String, ExtractError> {
    let luma = image.to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare(luma);
    let grids = prepared.detect_grids();

    let grid = grids.first().ok_or_else(|| ExtractError::CodeNotFound {
        name: doc_name.to_string(),
    })?;

    let (_meta, content) = grid.decode().map_err(|e| ExtractError::CodeNotFound {
        name: format!("{doc_name} (decode failed: {e})"),
    })?;

    if !content.is_ascii() {
        return Err(ExtractError::QrPayloadNotText {
            len: content.len(),
        });
    }

    debug!("QR payload: {}", content);
    Ok(content)
}
