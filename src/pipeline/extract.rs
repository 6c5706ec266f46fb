//! Field extraction: parse the verification page into an [`ExtractedRecord`].
//!
//! The page has a known layout: an introductory list item holding the tax
//! identifier as `"RFC: XAXX010101000, razón social..."`, and a data table
//! whose cells alternate label cells (containing a nested `<span>`) and plain
//! value cells. The walk keeps a current-label variable rather than pairing
//! cells positionally because some layouts emit consecutive label cells or
//! stray empty cells.
//!
//! Structural surprises (no list item, no `:` in it) surface as
//! [`ExtractError::UnexpectedMarkup`], never as a slice panic.

use crate::config::ExtractConfig;
use crate::error::ExtractError;
use crate::pipeline::normalize::normalize_label;
use crate::record::{ExtractedRecord, FieldValue};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Collect an element's text content into one string.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Pull the tax identifier out of the first list item.
///
/// The item reads `"RFC: XAXX010101000, ..."`: split on `:`, take the second
/// segment, split on `,`, take the first, trim.
fn extract_tax_id(document: &Html) -> Result<String, ExtractError> {
    let li_selector =
        Selector::parse("li").map_err(|e| ExtractError::Internal(format!("selector: {e}")))?;

    let first_li = document
        .select(&li_selector)
        .next()
        .ok_or_else(|| ExtractError::UnexpectedMarkup {
            detail: "no introductory list item found".into(),
        })?;

    let text = element_text(&first_li);
    let after_colon = text
        .split(':')
        .nth(1)
        .ok_or_else(|| ExtractError::UnexpectedMarkup {
            detail: format!("list item has no ':' separator: '{}'", text.trim()),
        })?;

    let tax_id = after_colon
        .split(',')
        .next()
        .unwrap_or(after_colon)
        .trim()
        .to_string();

    if tax_id.is_empty() {
        return Err(ExtractError::UnexpectedMarkup {
            detail: "tax identifier segment is empty".into(),
        });
    }

    Ok(tax_id)
}

/// Parse the fetched HTML into the ordered field mapping.
///
/// Walks the data-table cells keeping a current-label variable: a cell with a
/// nested `<span>` updates the label (after normalization); a plain cell is
/// the value for the current label, with an empty cell recorded as
/// [`FieldValue::Absent`]. Duplicate labels are last-write-wins. When
/// `config.stop_label` is set and a label cell's raw text matches it, the
/// walk stops after recording the value that follows.
pub fn extract_fields(
    html: &str,
    config: &ExtractConfig,
) -> Result<ExtractedRecord, ExtractError> {
    let document = Html::parse_document(html);

    let mut record = ExtractedRecord::new();
    record.insert("rfc", FieldValue::Text(extract_tax_id(&document)?));

    let cell_selector = Selector::parse(&config.cell_selector).map_err(|_| {
        ExtractError::InvalidConfig(format!(
            "'{}' is not a valid CSS selector",
            config.cell_selector
        ))
    })?;
    let span_selector =
        Selector::parse("span").map_err(|e| ExtractError::Internal(format!("selector: {e}")))?;

    let mut current_label: Option<String> = None;
    let mut stop_after_value = false;

    // The first selected cell is the table header; the data walk starts after it.
    for cell in document.select(&cell_selector).skip(1) {
        if let Some(span) = cell.select(&span_selector).next() {
            let raw = element_text(&span);
            if let Some(ref stop) = config.stop_label {
                if raw.trim() == stop {
                    stop_after_value = true;
                }
            }
            current_label = Some(normalize_label(&raw));
        } else {
            let value = FieldValue::from_cell(&element_text(&cell));
            match current_label.as_deref() {
                // A label that normalized to nothing drops its value.
                None | Some("") => continue,
                Some(label) => record.insert(label.to_string(), value),
            }
            if stop_after_value {
                break;
            }
        }
    }

    debug!("Extracted {} fields", record.len());
    Ok(record)
}
