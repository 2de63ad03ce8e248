//! Status reconciliation.
//!
//! Precedence, first match wins:
//! 1. A manual override answers immediately with no network activity.
//! 2. A feed failure is returned to the caller.
//! 3. The feed decides, unless the camera analysis is available and
//!    disagrees, in which case the analysis replaces the feed record.
//!
//! The analysis wins a disagreement even against a fresh `Closed` entry:
//! the feed is routinely slow to announce reopenings.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::analyzer::{AnalysisError, GeminiClient, TrafficAnalyzer, Verdict};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::FeedStatusExtractor;
use crate::status::{Override, StatusRecord};

/// Upper bound for a single status determination when the caller gives none.
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(120);

/// Marker prepended to details that come from camera analysis.
pub const ANALYSIS_PREFIX: &str = "✨ Analysis: ";

/// Build the record that replaces the feed record on disagreement.
#[must_use]
pub fn analysis_record(verdict: &Verdict) -> StatusRecord {
    StatusRecord {
        open: verdict.open,
        detail: format!("{ANALYSIS_PREFIX}{}", verdict.detail),
        link: String::new(),
        published_at: Some(verdict.checked_at),
    }
}

/// Combine the feed record with an analysis outcome.
///
/// Only a successful verdict that disagrees with the feed changes anything.
#[must_use]
pub fn reconcile(
    feed: StatusRecord,
    analysis: std::result::Result<Verdict, AnalysisError>,
) -> StatusRecord {
    match analysis {
        Ok(verdict) if verdict.open != feed.open => {
            info!(
                feed_open = feed.open,
                analysis_open = verdict.open,
                detail = %verdict.detail,
                "Camera analysis overrides feed"
            );
            analysis_record(&verdict)
        }
        Ok(_) => {
            debug!(open = feed.open, "Camera analysis agrees with feed");
            feed
        }
        Err(AnalysisError::NotConfigured) => feed,
        Err(e) => {
            warn!(error = %e, "Camera analysis unavailable, using feed status");
            feed
        }
    }
}

/// Produces one authoritative status from the override, feed and cameras.
#[derive(Debug, Clone)]
pub struct StatusMerger {
    override_status: Override,
    extractor: FeedStatusExtractor,
    analyzer: Arc<TrafficAnalyzer>,
}

impl StatusMerger {
    /// Assemble a merger from its parts.
    #[must_use]
    pub fn new(
        override_status: Override,
        extractor: FeedStatusExtractor,
        analyzer: Arc<TrafficAnalyzer>,
    ) -> Self {
        Self {
            override_status,
            extractor,
            analyzer,
        }
    }

    /// Build a merger from validated configuration.
    ///
    /// Camera analysis is enabled only when an API key is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = FeedStatusExtractor::new(
            config.feed.url.clone(),
            config.road.clone(),
            config.feed_timeout(),
        )?;
        debug!(feed = %extractor.url(), road = %extractor.road(), "Feed configured");

        let analyzer = match config.analyzer.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(api_key) => {
                let client = GeminiClient::new(
                    config.analyzer.endpoint.clone(),
                    config.analyzer.model.clone(),
                    api_key,
                    config.model_timeout(),
                )?;
                info!(
                    model = %client.model(),
                    cameras = config.analyzer.camera_urls.len(),
                    "Camera analysis enabled"
                );
                TrafficAnalyzer::new(
                    Arc::new(client),
                    &config.road,
                    config.analyzer.camera_urls.clone(),
                    config.cache_ttl(),
                    config.camera_timeout(),
                )?
            }
            None => {
                debug!("No API key configured, camera analysis disabled");
                TrafficAnalyzer::disabled()
            }
        };

        Ok(Self::new(
            config.override_status,
            extractor,
            Arc::new(analyzer),
        ))
    }

    /// The tracked road.
    #[must_use]
    pub fn road(&self) -> &str {
        self.extractor.road()
    }

    /// The active override.
    #[must_use]
    pub fn override_status(&self) -> Override {
        self.override_status
    }

    /// Determine the current status.
    ///
    /// # Errors
    ///
    /// Returns the feed error if the feed cannot be fetched or parsed.
    /// Analysis errors are logged and never returned.
    pub async fn current_status(&self) -> Result<StatusRecord> {
        if let Some(record) = self.override_status.record() {
            info!(open = record.open, "Manual override in effect");
            return Ok(record);
        }

        let feed = self.extractor.status().await?;

        if !self.analyzer.is_configured() {
            return Ok(feed);
        }

        let analysis = self.analyzer.check_status(Utc::now()).await;
        Ok(reconcile(feed, analysis))
    }

    /// Determine the current status, giving up after `deadline`.
    ///
    /// Expiry drops every in-flight fetch and model call. A cache refresh
    /// that is cut short leaves the previous verdict in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the deadline passes, otherwise the
    /// same errors as [`StatusMerger::current_status`].
    pub async fn status_within(&self, deadline: Duration) -> Result<StatusRecord> {
        tokio::time::timeout(deadline, self.current_status())
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("status determination for {}", self.road()),
            })?
    }
}
