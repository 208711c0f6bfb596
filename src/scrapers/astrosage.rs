//! Field extraction for AstroSage daily horoscope pages.
//!
//! All language editions share one layout:
//!
//! - the forecast text sits in the first `.ui-large-content` block (older
//!   templates use `.ui-horoscope-content` or `.ui-content-block`);
//! - lucky number, lucky colour and remedy are `div.ui-large-content` blocks
//!   whose bold label is followed by the value, e.g.
//!   `<div class="ui-large-content"><b>Lucky Number :-</b> 7</div>`;
//! - ratings are `.col-sm-4` / `.col-sm-6` blocks holding a bold category
//!   name and one star image per point, filled stars being `star2.gif`.

use super::{Extractor, Page};
use crate::error::{Error, Result};
use crate::models::{ExtractedFields, Labels};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;

const CONTENT_SELECTORS: [&str; 4] = [
    ".ui-large-content",
    ".ui-large-content.text-justify",
    ".ui-horoscope-content",
    ".ui-content-block",
];
const LABELLED_BLOCK_SELECTOR: &str = "div.ui-large-content";
const RATING_BLOCK_SELECTOR: &str = ".col-sm-4, .col-sm-6";
const FILLED_STAR: &str = "star2.gif";

/// [`Extractor`] for the AstroSage page layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct AstrosageExtractor;

impl Extractor for AstrosageExtractor {
    fn extract(&self, page: &Page, labels: &Labels) -> Result<ExtractedFields> {
        let document = Html::parse_document(&page.html);

        let mut fields = ExtractedFields {
            horoscope: forecast_text(&document)?,
            ..Default::default()
        };
        extract_labelled_values(&document, labels, &mut fields)?;
        fields.ratings = extract_ratings(&document)?;

        debug!(
            url = %page.url,
            has_text = fields.horoscope.is_some(),
            ratings = fields.ratings.len(),
            "Extracted fields"
        );
        Ok(fields)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Extract(format!("invalid selector '{css}': {e}")))
}

/// Concatenated text of an element, not normalized.
fn raw_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Trim every line and drop blank ones.
fn normalize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

fn forecast_text(document: &Html) -> Result<Option<String>> {
    for css in CONTENT_SELECTORS {
        if let Some(element) = document.select(&selector(css)?).next() {
            return Ok(non_empty(normalize(&raw_text(element))));
        }
    }
    Ok(None)
}

fn extract_labelled_values(
    document: &Html,
    labels: &Labels,
    fields: &mut ExtractedFields,
) -> Result<()> {
    let block = selector(LABELLED_BLOCK_SELECTOR)?;
    let bold = selector("b")?;

    for div in document.select(&block) {
        let Some(label_element) = div.select(&bold).next() else {
            continue;
        };
        let label_raw = raw_text(label_element);
        let label = normalize(&label_raw);
        let value = normalize(&raw_text(div).replacen(&label_raw, "", 1));

        let matches = |candidates: &[String]| candidates.iter().any(|c| label.contains(c.as_str()));
        if matches(&labels.lucky_number) {
            fields.lucky_number = Some(value);
        } else if matches(&labels.lucky_color) {
            fields.lucky_color = Some(value);
        } else if matches(&labels.remedy) {
            fields.remedy = Some(value);
        }
    }
    Ok(())
}

fn extract_ratings(document: &Html) -> Result<BTreeMap<String, u32>> {
    let block = selector(RATING_BLOCK_SELECTOR)?;
    let bold = selector("b")?;
    let image = selector("img")?;

    let mut ratings = BTreeMap::new();
    for div in document.select(&block) {
        let Some(label_element) = div.select(&bold).next() else {
            continue;
        };
        let category = normalize(&raw_text(label_element).replacen(':', "", 1));
        if category.is_empty() {
            continue;
        }
        let filled = div
            .select(&image)
            .filter(|img| {
                img.value()
                    .attr("src")
                    .is_some_and(|src| src.contains(FILLED_STAR))
            })
            .count() as u32;
        if filled > 0 {
            ratings.insert(category, filled);
        }
    }
    Ok(ratings)
}
