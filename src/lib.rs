//! # conecta
//!
//! Client connectors for the SaaS platforms our ops tooling lives on — a CRM
//! (Salesforce), a BI store (Metabase), Google Sheets and a proprietary
//! catalog GraphQL API — plus a pipeline that turns an uploaded tax-status
//! certificate (a "Constancia de Situación Fiscal" PDF) into a structured
//! record.
//!
//! ## Extraction Pipeline
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Render   rasterise page one via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Decode   find the QR code, read the verification URL
//!  ├─ 3. Fetch    headless Chromium → DOM-content-loaded → HTML
//!  └─ 4. Extract  label/value table walk → ordered snake_case record
//! ```
//!
//! The pipeline is linear and fail-fast: no retries, no concurrency, no
//! partial results. The browser is the only scoped resource and is released
//! on every exit path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conecta::{extract, DocumentSource, ExtractConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data = std::fs::read("constancia.pdf")?;
//!     let source = DocumentSource::Bytes { name: "constancia.pdf".into(), data };
//!     let record = extract(source, &ExtractConfig::default()).await?;
//!     println!("RFC: {}", record.rfc().unwrap_or("?"));
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Wrappers
//!
//! Each wrapper authenticates once at construction and exposes thin
//! request/reshape operations; see [`clients`]. Expired sessions surface as
//! [`ClientError::AuthenticationExpired`] — recreate the client, nothing
//! re-authenticates behind your back. [`finder::SupplierFinder`] assembles
//! CRM and BI data into a supplier search.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `csf-extract` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clients;
pub mod config;
pub mod error;
pub mod extract;
pub mod finder;
pub mod pipeline;
pub mod record;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractConfig, ExtractConfigBuilder, FetchConfig};
pub use error::{ClientError, ExtractError};
pub use extract::{extract, extract_sync, DocumentSource};
pub use record::{ExtractedRecord, FieldValue};
pub use table::Table;
