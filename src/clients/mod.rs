//! Thin client wrappers over the external platforms.
//!
//! Every wrapper follows the same discipline: authenticate once at
//! construction, build a request payload from typed parameters, perform one
//! HTTP call, and reshape the JSON response into a [`crate::table::Table`]
//! or a typed struct. No wrapper retries, caches, or re-authenticates — an
//! expired session surfaces as
//! [`crate::error::ClientError::AuthenticationExpired`] and the caller
//! recreates the client.
//!
//! The one deliberate exception to "one call": the BI wrapper's cursor
//! pagination loop, which re-issues a query with a shifted numeric cursor
//! until a short page signals exhaustion, and the CRM bulk insert, which is
//! best-effort with per-record error reporting.

pub mod catalog;
pub mod metabase;
pub mod salesforce;
pub mod sheets;
