//! Application listing HTML parser
//!
//! Parses the sgprapp.com listing pages (one table, one row per
//! application, newest first) into [`ApplicationRecord`]s.

use scraper::{ElementRef, Html, Selector};
use sgpr_common::Category;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{ApplicationRecord, RawRow};

/// id-link, nickname, description, status, start, end, last update
pub const LISTING_COLUMNS: usize = 7;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("selector error: {0}")]
    Selector(String),

    #[error("expected 7 columns, found {0}")]
    RowShape(usize),
}

struct RowSelectors {
    td: Selector,
    anchor: Selector,
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector(e.to_string()))
}

/// Parse a listing page into records, in document order.
///
/// Rows with the wrong number of columns are skipped; every other row
/// yields a record, with unparseable cells left empty.
pub fn parse_listing(category: Category, html: &str) -> Result<Vec<ApplicationRecord>, ExtractError> {
    let document = Html::parse_document(html);

    let row_sel = selector("tbody > tr")?;
    let selectors = RowSelectors {
        td: selector("td")?,
        anchor: selector("a")?,
    };

    let mut records = Vec::new();
    for (index, tr) in document.select(&row_sel).enumerate() {
        match parse_row(category, tr, &selectors) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed {} row #{}: {}", category, index, e),
        }
    }

    debug!("Parsed {} {} records", records.len(), category);
    Ok(records)
}

fn parse_row(
    category: Category,
    tr: ElementRef<'_>,
    selectors: &RowSelectors,
) -> Result<ApplicationRecord, ExtractError> {
    let tds: Vec<ElementRef<'_>> = tr.select(&selectors.td).collect();
    if tds.len() != LISTING_COLUMNS {
        return Err(ExtractError::RowShape(tds.len()));
    }

    let edit_link = tds[0]
        .select(&selectors.anchor)
        .next()
        .and_then(|a| a.value().attr("data-href"))
        .map(str::to_string);

    let text = |i: usize| tds[i].text().collect::<String>();

    let raw = RawRow {
        edit_link,
        nickname: text(1),
        description: text(2),
        status: text(3),
        start: text(4),
        end: text(5),
        last_update: text(6),
    };

    Ok(ApplicationRecord::from_raw(category, raw))
}
