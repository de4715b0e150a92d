//! Listing updater
//!
//! Fetches every configured category page, parses it and keeps the
//! newest `cap` records per category. A category whose page cannot be
//! fetched is left out of the result for this cycle.

use async_trait::async_trait;
use reqwest::Client;
use sgpr_common::Category;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::parser::parse_listing;
use super::types::Listings;

pub const DEFAULT_FETCH_CAP: usize = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Raw response of a page fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// reqwest-backed fetcher with a bounded request timeout
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 sgprapp-bot/1.0")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;

        Ok(FetchedPage {
            status,
            body: body.to_vec(),
        })
    }
}

/// Fetches and parses all category pages of one cycle
pub struct ListingUpdater {
    fetcher: Arc<dyn PageFetcher>,
    sources: BTreeMap<Category, String>,
    cap: usize,
}

impl ListingUpdater {
    pub fn new(fetcher: Arc<dyn PageFetcher>, sources: BTreeMap<Category, String>, cap: usize) -> Self {
        Self { fetcher, sources, cap }
    }

    pub fn sources(&self) -> &BTreeMap<Category, String> {
        &self.sources
    }

    /// Fetch → parse → cap every category. Never fails as a whole.
    pub async fn fetch_all(&self) -> Listings {
        let mut listings = Listings::new();

        for (&category, url) in &self.sources {
            match self.fetch_category(category, url).await {
                Ok(records) => {
                    tracing::info!("{}: fetched {} records from {}", category, records.len(), url);
                    listings.insert(category, records);
                }
                Err(e) => {
                    tracing::warn!("{}: skipping this cycle: {:#}", category, e);
                }
            }
        }

        listings
    }

    async fn fetch_category(
        &self,
        category: Category,
        url: &str,
    ) -> anyhow::Result<Vec<super::ApplicationRecord>> {
        let page = self.fetcher.fetch(url).await?;
        if !page.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            }
            .into());
        }

        let html = String::from_utf8_lossy(&page.body);
        let mut records = parse_listing(category, &html)?;
        records.truncate(self.cap);
        Ok(records)
    }
}
