//! Pipeline stages for certificate extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the browser driver) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ decode ──▶ fetch ──▶ extract
//! (pdfium)    (QR)    (browser)  (selectors + normalize)
//! ```
//!
//! 1. [`render`]    — rasterise page one of the PDF; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`decode`]    — scan the bitmap for a QR code and read the payload URL
//! 3. [`fetch`]     — drive a headless browser to the URL and capture the
//!    rendered HTML; the only stage with network I/O and the only one
//!    holding an external process
//! 4. [`extract`]   — walk the page's label/value table into the record,
//!    using [`normalize`] to turn source labels into snake_case keys

pub mod decode;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod render;
