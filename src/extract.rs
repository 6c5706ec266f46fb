//! Eager (whole-document) extraction entry points.
//!
//! The pipeline is linear and fail-fast: each stage consumes the previous
//! stage's output, the first error aborts the run, and no partial record is
//! ever returned. There is deliberately no retry and no concurrency — a
//! certificate is one page, one QR code, one fetch.

use crate::config::ExtractConfig;
use crate::error::ExtractError;
use crate::pipeline::{decode, extract as fields, fetch, render};
use crate::record::ExtractedRecord;
use std::time::Instant;
use tracing::{debug, info};

pub use crate::pipeline::render::DocumentSource;

/// Extract the structured record from a tax-status certificate.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `source` — The uploaded document, as bytes with a filename or a path
/// * `config` — Extraction configuration
///
/// # Errors
/// Fail-fast: the first stage error aborts the run.
/// - Not a `.pdf` / unreadable document
/// - No QR code on page one, or a non-ASCII payload
/// - Navigation failure or timeout on the verification page
/// - Markup without the expected identifier or table
///
/// # Example
/// ```rust,no_run
/// use conecta::{extract, DocumentSource, ExtractConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = std::fs::read("constancia.pdf")?;
/// let source = DocumentSource::Bytes { name: "constancia.pdf".into(), data };
/// let record = extract(source, &ExtractConfig::default()).await?;
/// println!("{}", serde_json::to_string_pretty(&record)?);
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    source: DocumentSource,
    config: &ExtractConfig,
) -> Result<ExtractedRecord, ExtractError> {
    let start = Instant::now();
    let doc_name = source.name();
    info!("Starting extraction: {}", doc_name);

    // ── Step 1: Rasterise page one ───────────────────────────────────────
    let image = render::render_first_page(source, config).await?;

    // ── Step 2: Decode the QR payload URL ────────────────────────────────
    let url = decode::decode_qr_url(&image, &doc_name)?;
    drop(image);

    // ── Step 3: Fetch the rendered verification page ─────────────────────
    let html = fetch::fetch_html(&url, &config.fetch).await?;
    debug!("Fetched {} bytes of markup", html.len());

    // ── Step 4: Scrape the label/value table ─────────────────────────────
    let record = fields::extract_fields(&html, config)?;

    info!(
        "Extraction complete: {} fields in {}ms",
        record.len(),
        start.elapsed().as_millis()
    );
    Ok(record)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally. Must not be called from
/// within an async context.
pub fn extract_sync(
    source: DocumentSource,
    config: &ExtractConfig,
) -> Result<ExtractedRecord, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(source, config))
}
