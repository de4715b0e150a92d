//! sgprapp.com application listing module
//!
//! Scrapes the per-category listing pages into typed records.

pub mod types;
pub mod parser;
pub mod updater;

pub use types::{ApplicationRecord, Listings, RawRow, DEFAULT_SIGNATURE};
pub use parser::{parse_listing, ExtractError};
pub use updater::{FetchError, FetchedPage, HttpFetcher, ListingUpdater, PageFetcher, DEFAULT_FETCH_CAP};
