//! Listing data types

use chrono::{NaiveDate, NaiveDateTime};
use sgpr_common::{ApplicationStatus, Category};
use std::collections::BTreeMap;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Signature appended to every rendered record unless configured otherwise
pub const DEFAULT_SIGNATURE: &str = "@sgprapp";

/// Per-category records of one fetch cycle, newest first
pub type Listings = BTreeMap<Category, Vec<ApplicationRecord>>;

/// Cell texts of one listing row, before any parsing
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    /// `data-href` of the anchor in the first column, if any
    pub edit_link: Option<String>,
    pub nickname: String,
    pub description: String,
    pub status: String,
    pub start: String,
    pub end: String,
    pub last_update: String,
}

/// One row of the application listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    category: Category,
    id: Option<i64>,
    nickname: String,
    description: String,
    status: ApplicationStatus,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    last_update: Option<NaiveDateTime>,
}

impl ApplicationRecord {
    /// Build a record from raw cell texts. Never fails: each bad cell
    /// degrades to `None` / `Unknown` on its own.
    pub fn from_raw(category: Category, raw: RawRow) -> Self {
        Self {
            category,
            id: raw.edit_link.as_deref().and_then(parse_edit_id),
            nickname: raw.nickname.trim().to_string(),
            description: raw.description.trim().to_string(),
            status: ApplicationStatus::from_label(&raw.status),
            start: parse_date(&raw.start),
            end: parse_date(&raw.end),
            last_update: parse_date_time(&raw.last_update),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    /// Ordering key used against delivery watermarks
    pub fn last_update(&self) -> Option<NaiveDateTime> {
        self.last_update
    }

    /// Render the Telegram HTML message for this record.
    pub fn render(&self, signature: &str) -> String {
        format!(
            "<b>{} {} Application by {}</b>\n\n\
             Description: {}\n\n\
             Status: {}\n\n\
             Time span: {} -> {}\n\n\
             <i>Last modified at {}</i> {}",
            self.status.as_emoji(),
            self.category,
            html_escape::encode_text(&self.nickname),
            html_escape::encode_text(&self.description),
            self.status,
            display_date(self.start),
            display_date(self.end),
            self.last_update
                .map(|ts| ts.format(DATE_TIME_FORMAT).to_string())
                .unwrap_or_else(|| "?".to_string()),
            html_escape::encode_text(signature),
        )
    }
}

impl std::fmt::Display for ApplicationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render(DEFAULT_SIGNATURE))
    }
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), DATE_TIME_FORMAT).ok()
}

/// Extract `123` from `/edit?id=123`
fn parse_edit_id(link: &str) -> Option<i64> {
    link.strip_prefix("/edit?id=")?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(last_update: &str) -> RawRow {
        RawRow {
            edit_link: Some("/edit?id=42".to_string()),
            nickname: "  tom  ".to_string(),
            description: " EP holder, 3 years ".to_string(),
            status: "通过".to_string(),
            start: "2024-01-05".to_string(),
            end: "2024-03-01".to_string(),
            last_update: last_update.to_string(),
        }
    }

    #[test]
    fn test_from_raw_well_formed() {
        let record = ApplicationRecord::from_raw(Category::PR, raw("2024-03-01 08:30"));
        assert_eq!(record.id(), Some(42));
        assert_eq!(record.nickname(), "tom");
        assert_eq!(record.description(), "EP holder, 3 years");
        assert_eq!(record.status(), ApplicationStatus::Approved);
        assert_eq!(record.start(), NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(
            record.last_update(),
            NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(8, 30, 0))
        );
    }

    #[test]
    fn test_from_raw_degrades_bad_cells() {
        let mut row = raw("yesterday");
        row.edit_link = Some("/view?id=42".to_string());
        row.status = "???".to_string();
        row.start = "2024/01/05".to_string();
        let record = ApplicationRecord::from_raw(Category::Citizen, row);
        assert_eq!(record.id(), None);
        assert_eq!(record.status(), ApplicationStatus::Unknown);
        assert_eq!(record.start(), None);
        assert_eq!(record.last_update(), None);
        assert_eq!(record.end(), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_parse_edit_id() {
        assert_eq!(parse_edit_id("/edit?id=7"), Some(7));
        assert_eq!(parse_edit_id("/edit?id="), None);
        assert_eq!(parse_edit_id("/edit?id=abc"), None);
        assert_eq!(parse_edit_id("edit?id=7"), None);
    }

    #[test]
    fn test_render() {
        let mut row = raw("2024-03-01 08:30");
        row.nickname = "<tom & jerry>".to_string();
        row.end = String::new();
        let record = ApplicationRecord::from_raw(Category::PR, row);
        let text = record.render("@sgprapp");
        assert_eq!(
            text,
            "<b>✅ PR Application by &lt;tom &amp; jerry&gt;</b>\n\n\
             Description: EP holder, 3 years\n\n\
             Status: Approved\n\n\
             Time span: 2024-01-05 -> ?\n\n\
             <i>Last modified at 2024-03-01 08:30</i> @sgprapp"
        );
    }
}
