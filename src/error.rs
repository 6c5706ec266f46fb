//! Error types for the conecta library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal, fail-fast**: the document-extraction
//!   pipeline cannot produce a record (wrong file type, no QR code, the
//!   target page would not load). Returned as `Err(ExtractError)` from the
//!   top-level `extract*` functions; no partial record is ever returned.
//!
//! * [`ClientError`] — failures talking to a remote platform (CRM, BI,
//!   spreadsheet, catalog). Bulk record mutations do NOT surface these
//!   per-record: they collect failures into
//!   [`crate::clients::salesforce::BatchOutcome`] and keep going, so one bad
//!   row never aborts a batch.
//!
//! The separation keeps the two propagation policies honest: single-document
//! extraction is all-or-nothing, batch remote mutations are best-effort with
//! reporting.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the extraction pipeline.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded document does not carry a `.pdf` extension.
    #[error("Unsupported document format: '{name}'\nOnly PDF files are accepted.")]
    UnsupportedFormat { name: String },

    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// pdfium could not parse the document.
    #[error("Document '{name}' could not be rendered: {detail}")]
    CorruptDocument { name: String, detail: String },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// No scannable QR code was detected on the rendered page.
    #[error("No QR code found on page one of '{name}'")]
    CodeNotFound { name: String },

    /// A QR code was found but its payload is not ASCII text.
    #[error("QR payload is not ASCII text ({len} bytes)")]
    QrPayloadNotText { len: usize },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The browser could not be launched or could not load the target URL.
    #[error("Failed to load '{url}': {reason}")]
    Navigation { url: String, reason: String },

    /// The page did not reach DOM-content-loaded within the configured timeout.
    #[error("Navigation to '{url}' timed out after {ms}ms\nIncrease FetchConfig.timeout_ms.")]
    NavigationTimeout { url: String, ms: u64 },

    // ── Markup errors ─────────────────────────────────────────────────────
    /// The fetched HTML does not contain the expected identifier or table.
    #[error("Unexpected page structure: {detail}")]
    UnexpectedMarkup { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors returned by the remote-platform client wrappers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The platform answered with a non-success status.
    #[error("Remote API error (HTTP {status}): {body}")]
    RemoteApi { status: u16, body: String },

    /// The session/token the client was built with is no longer accepted.
    ///
    /// There is no automatic re-authentication: recreate the client with
    /// fresh credentials when you see this.
    #[error("Authentication expired for {platform}\nRecreate the client with fresh credentials.")]
    AuthenticationExpired { platform: String },

    /// The response parsed as JSON but not into the expected shape.
    #[error("Malformed response from {platform}: {detail}")]
    MalformedResponse { platform: String, detail: String },

    /// A query string failed client-side validation (e.g. the pagination
    /// placeholders are missing).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A typed parameter failed validation before any request was built
    /// (unknown gauge value, missing dimension for an item family).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No cached OAuth token exists at the configured path.
    #[error("No cached token at '{path}'\nRun the consent flow once and store the authorized_user JSON there.")]
    MissingToken { path: PathBuf },

    /// Credential or token file could not be read or written.
    #[error("Credential I/O failed for '{path}': {source}")]
    CredentialIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP transport itself failed (DNS, TLS, connect, body read).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Classify a non-success HTTP response, mapping auth failures to
    /// [`ClientError::AuthenticationExpired`] so callers can tell "log in
    /// again" apart from "the request was wrong".
    pub(crate) fn from_status(platform: &str, status: u16, body: String) -> Self {
        if status == 401 || body.contains("INVALID_SESSION_ID") {
            ClientError::AuthenticationExpired {
                platform: platform.to_string(),
            }
        } else {
            ClientError::RemoteApi { status, body }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = ExtractError::UnsupportedFormat {
            name: "scan.png".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.png"), "got: {msg}");
        assert!(msg.contains("PDF"));
    }

    #[test]
    fn navigation_timeout_display() {
        let e = ExtractError::NavigationTimeout {
            url: "https://example.gob.mx".into(),
            ms: 30_000,
        };
        assert!(e.to_string().contains("30000ms"));
    }

    #[test]
    fn status_401_maps_to_auth_expired() {
        let e = ClientError::from_status("salesforce", 401, "Session expired".into());
        assert!(matches!(e, ClientError::AuthenticationExpired { .. }));
    }

    #[test]
    fn invalid_session_body_maps_to_auth_expired() {
        let e = ClientError::from_status(
            "salesforce",
            400,
            r#"[{"errorCode":"INVALID_SESSION_ID"}]"#.into(),
        );
        assert!(matches!(e, ClientError::AuthenticationExpired { .. }));
    }

    #[test]
    fn other_status_maps_to_remote_api() {
        let e = ClientError::from_status("metabase", 404, "not found".into());
        match e {
            ClientError::RemoteApi { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
