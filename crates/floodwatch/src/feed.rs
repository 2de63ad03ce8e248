//! Road alert feed extraction.
//!
//! The county feed announces incidents as items whose titles start with
//! `Open`, `Closed` or `Restricted`. The first item mentioning the tracked
//! road is authoritative; the feed lists the newest announcements first.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::status::StatusRecord;

/// Title prefix that marks a road as closed.
const CLOSED_PREFIX: &str = "Closed";

/// A single announcement from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// The announcement title, e.g. `Closed - 124th Ave NE`.
    pub title: String,
    /// Link to the announcement.
    pub link: String,
    /// When the announcement was published, if the feed says.
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Whether this item leaves the road open.
    ///
    /// Only an explicit `Closed` prefix closes the road. `Open`,
    /// `Restricted` and anything else count as open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.title.starts_with(CLOSED_PREFIX)
    }

    /// Check if the title mentions the given road (case-sensitive, anywhere).
    #[must_use]
    pub fn mentions(&self, road: &str) -> bool {
        self.title.contains(road)
    }

    /// Convert the item into a status record.
    #[must_use]
    pub fn to_record(&self) -> StatusRecord {
        StatusRecord {
            open: self.is_open(),
            detail: self.title.clone(),
            link: self.link.clone(),
            published_at: self.published_at,
        }
    }
}

impl From<feed_rs::model::Entry> for FeedItem {
    fn from(entry: feed_rs::model::Entry) -> Self {
        Self {
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            link: entry
                .links
                .into_iter()
                .next()
                .map(|l| l.href)
                .unwrap_or_default(),
            published_at: entry.published.or(entry.updated),
        }
    }
}

/// Return the first item, in feed order, that mentions `road`.
#[must_use]
pub fn select_road_item<'a>(items: &'a [FeedItem], road: &str) -> Option<&'a FeedItem> {
    items.iter().find(|item| item.mentions(road))
}

/// Parse a syndication document (RSS, Atom or JSON Feed) into items.
///
/// # Errors
///
/// Returns [`Error::FeedParse`] if the body is not a recognizable feed.
pub fn parse_items(url: &str, body: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = feed_rs::parser::parse(body).map_err(|source| Error::FeedParse {
        url: url.to_string(),
        source,
    })?;
    Ok(feed.entries.into_iter().map(FeedItem::from).collect())
}

/// Fetches the road alert feed and finds the announcement for one road.
///
/// Stateless apart from the HTTP client: every call goes to the network and
/// failures are never masked by earlier results.
#[derive(Debug, Clone)]
pub struct FeedStatusExtractor {
    client: reqwest::Client,
    url: String,
    road: String,
}

impl FeedStatusExtractor {
    /// Create an extractor with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, road: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self::with_client(client, url, road))
    }

    /// Create an extractor that reuses an existing HTTP client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        road: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            road: road.into(),
        }
    }

    /// The tracked road substring.
    #[must_use]
    pub fn road(&self) -> &str {
        &self.road
    }

    /// The feed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the feed and return the first item mentioning the road.
    ///
    /// Returns `Ok(None)` when the road is not mentioned at all.
    ///
    /// # Errors
    ///
    /// Network failures, non-success statuses and unparsable bodies are
    /// returned as-is; nothing is retried.
    pub async fn latest_alert(&self) -> Result<Option<FeedItem>> {
        let body = self.fetch().await?;
        let items = parse_items(&self.url, &body)?;
        debug!(items = items.len(), road = %self.road, "Parsed road alert feed");
        Ok(select_road_item(&items, &self.road).cloned())
    }

    /// Fetch the feed and build the feed-derived status record.
    ///
    /// # Errors
    ///
    /// See [`FeedStatusExtractor::latest_alert`].
    pub async fn status(&self) -> Result<StatusRecord> {
        Ok(self
            .latest_alert()
            .await?
            .map_or_else(StatusRecord::unmentioned, |item| item.to_record()))
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::feed_fetch(&self.url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::feed_fetch(&self.url, format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::feed_fetch(&self.url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
