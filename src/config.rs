//! Configuration types for the extraction pipeline.
//!
//! All pipeline behaviour is controlled through [`ExtractConfig`], built via
//! its [`ExtractConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across calls, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! The browser gets its own [`FetchConfig`] because the fetch stage is the
//! only one holding an external process: its options (headless flag, timeout)
//! are explicit here rather than ambient launch-argument globals.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};

/// Default navigation timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Browser automation options for the page-fetch stage.
///
/// The fetch waits for DOM-content-loaded, not network idle — the source
/// pages load slow tracking subresources that would otherwise stall every
/// extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Run the browser without a visible window. Default: true.
    pub headless: bool,

    /// Navigation timeout in milliseconds. Default: 30_000.
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Configuration for a document extraction run.
///
/// Built via [`ExtractConfig::builder()`] or using
/// [`ExtractConfig::default()`].
///
/// # Example
/// ```rust
/// use conecta::ExtractConfig;
///
/// let config = ExtractConfig::builder()
///     .dpi(300)
///     .stop_label("AL:")
///     .timeout_ms(45_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Rendering DPI for page one of the document. Range: 72–600. Default: 300.
    ///
    /// The QR module needs enough pixels per cell to be detected reliably;
    /// 300 DPI resolves the code on every certificate layout seen so far.
    /// Lower values speed up rendering but start losing small codes.
    pub dpi: u32,

    /// Browser options for the page-fetch stage.
    pub fetch: FetchConfig,

    /// Label text that terminates the table walk, e.g. `"AL:"`.
    ///
    /// Some source layouts repeat decorative rows after the last data field;
    /// deployments that scrape those layouts set the sentinel so the walk
    /// stops after recording the value that follows it. `None` (the default)
    /// processes the whole table. This is per-deployment layout knowledge,
    /// not a general parsing rule.
    pub stop_label: Option<String>,

    /// CSS selector for the data cells of the label/value table.
    /// Default: `tr.ui-widget-content td`.
    pub cell_selector: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            fetch: FetchConfig::default(),
            stop_label: None,
            cell_selector: "tr.ui-widget-content td".to_string(),
        }
    }
}

impl ExtractConfig {
    /// Create a new builder for `ExtractConfig`.
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractConfig`].
#[derive(Debug)]
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn headless(mut self, v: bool) -> Self {
        self.config.fetch.headless = v;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.fetch.timeout_ms = ms.max(1);
        self
    }

    pub fn stop_label(mut self, label: impl Into<String>) -> Self {
        self.config.stop_label = Some(label.into());
        self
    }

    pub fn cell_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.cell_selector = selector.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if scraper::Selector::parse(&c.cell_selector).is_err() {
            return Err(ExtractError::InvalidConfig(format!(
                "'{}' is not a valid CSS selector",
                c.cell_selector
            )));
        }
        if let Some(ref label) = c.stop_label {
            if label.is_empty() {
                return Err(ExtractError::InvalidConfig(
                    "stop_label must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractConfig::default();
        assert_eq!(c.dpi, 300);
        assert!(c.fetch.headless);
        assert_eq!(c.fetch.timeout_ms, 30_000);
        assert!(c.stop_label.is_none());
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = ExtractConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
        let c = ExtractConfig::builder().dpi(5000).build().unwrap();
        assert_eq!(c.dpi, 600);
    }

    #[test]
    fn builder_rejects_bad_selector() {
        let err = ExtractConfig::builder()
            .cell_selector("tr[[")
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_stop_label() {
        let err = ExtractConfig::builder().stop_label("").build().unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }
}
