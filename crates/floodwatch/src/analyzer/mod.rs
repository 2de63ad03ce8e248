//! Camera-based road status analysis.
//!
//! The county feed is often hours behind reality, so the analyzer looks at
//! live traffic cameras and asks a vision model whether the road is blocked.
//! Model calls are rate limited by a single cached verdict: at most one
//! analysis runs per TTL window no matter how many requests arrive.

pub mod camera;
pub mod gemini;
pub mod model;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use camera::{fetch_images, CameraImage};
pub use gemini::GeminiClient;
pub use model::{GenerateRequest, ModelError, Part, VisionModel};

use crate::error::{Error, Result};

/// How long a verdict stays valid.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Per-camera fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Reply prefix that marks the road as closed (compared case-insensitively).
const CLOSED_REPLY: &str = "CLOSED";

/// Errors that make an analysis unavailable.
///
/// These are always recoverable: callers fall back to the feed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No vision model was configured.
    #[error("camera analysis is not configured")]
    NotConfigured,

    /// None of the cameras returned an image.
    #[error("no images could be fetched from {cameras} camera(s)")]
    NoImages {
        /// Number of cameras that were tried.
        cameras: usize,
    },

    /// The model call failed or returned nothing usable.
    #[error("vision model error: {0}")]
    Model(#[from] ModelError),
}

/// An open/closed determination from camera imagery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the road looked open.
    pub open: bool,
    /// The model's one-sentence reason.
    pub detail: String,
    /// When the model answered.
    pub checked_at: DateTime<Utc>,
}

/// The single cached verdict. Replaced whole, never field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AnalysisCache {
    open: bool,
    detail: String,
    last_checked_at: DateTime<Utc>,
}

impl AnalysisCache {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_checked_at < ttl
    }

    fn verdict(&self) -> Verdict {
        Verdict {
            open: self.open,
            detail: self.detail.clone(),
            checked_at: self.last_checked_at,
        }
    }
}

/// Parse a model reply of the form `CLOSED: <reason>` or `OPEN: <reason>`.
///
/// Anything not starting with `CLOSED` (any case) counts as open. The
/// detail is the text after the first colon, or the whole reply if there is
/// no colon.
#[must_use]
pub fn parse_verdict(reply: &str) -> (bool, String) {
    let text = reply.trim();
    let open = !text.to_uppercase().starts_with(CLOSED_REPLY);
    let detail = match text.split_once(':') {
        Some((_, rest)) => rest.trim(),
        None => text,
    };
    (open, detail.to_string())
}

/// Build the instruction sent ahead of the camera images.
#[must_use]
pub fn prompt_for(road: &str) -> String {
    format!(
        "Analyze these traffic camera images of {road}. Determine if the road appears \
         to be closed. Look for 'Road Closed' signs, traffic cones, or barricades. \
         Ignore normal traffic. If the road is closed, reply with 'CLOSED: <reason>'. \
         If the road is open, reply with 'OPEN: <reason>'. Keep the reason short \
         (1 sentence)."
    )
}

/// Infers road status from live camera imagery, with a cached verdict.
#[derive(Debug)]
pub struct TrafficAnalyzer {
    model: Option<Arc<dyn VisionModel>>,
    http: Option<reqwest::Client>,
    camera_urls: Vec<String>,
    prompt: String,
    ttl: chrono::Duration,
    cache: Mutex<Option<AnalysisCache>>,
}

impl TrafficAnalyzer {
    /// Create an analyzer that asks `model` about `camera_urls`.
    ///
    /// # Errors
    ///
    /// Returns an error if the camera HTTP client cannot be built or the
    /// TTL is out of range.
    pub fn new(
        model: Arc<dyn VisionModel>,
        road: &str,
        camera_urls: Vec<String>,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(Error::HttpClient)?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::config(format!("cache TTL out of range: {e}")))?;

        Ok(Self {
            model: Some(model),
            http: Some(http),
            camera_urls,
            prompt: prompt_for(road),
            ttl,
            cache: Mutex::new(None),
        })
    }

    /// Create an analyzer with no model; every check fails with
    /// [`AnalysisError::NotConfigured`].
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            model: None,
            http: None,
            camera_urls: Vec::new(),
            prompt: String::new(),
            ttl: chrono::Duration::zero(),
            cache: Mutex::new(None),
        }
    }

    /// Check if a vision model is available.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// The configured cameras, in order.
    #[must_use]
    pub fn camera_urls(&self) -> &[String] {
        &self.camera_urls
    }

    /// Return the current verdict, analysing afresh if the cache is stale.
    ///
    /// The cache lock is held across the fetch-and-analyse sequence so
    /// concurrent misses wait for the first one instead of calling the
    /// model again. On any failure the previous verdict is kept.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError`] if no model is configured, no camera
    /// answered, or the model call failed.
    pub async fn check_status(
        &self,
        now: DateTime<Utc>,
    ) -> std::result::Result<Verdict, AnalysisError> {
        let (Some(model), Some(http)) = (&self.model, &self.http) else {
            return Err(AnalysisError::NotConfigured);
        };

        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(now, self.ttl)) {
            debug!(checked_at = %cached.last_checked_at, "Using cached camera verdict");
            return Ok(cached.verdict());
        }

        let started = tokio::time::Instant::now();
        let images = fetch_images(http, &self.camera_urls).await;
        if images.is_empty() {
            return Err(AnalysisError::NoImages {
                cameras: self.camera_urls.len(),
            });
        }

        let mut request = GenerateRequest::with_prompt(self.prompt.clone());
        for image in images {
            request.push_image(image.mime_type, image.data);
        }

        let reply = model.generate(&request).await?;
        let (open, detail) = parse_verdict(&reply);

        // Stamp when the model answered, not when the request started.
        let took = chrono::Duration::from_std(started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let answered_at = now + took;
        // Never move the check time backwards, even if the caller's clock did.
        let last_checked_at = cache
            .as_ref()
            .map_or(answered_at, |c| c.last_checked_at.max(answered_at));

        let fresh = AnalysisCache {
            open,
            detail,
            last_checked_at,
        };
        info!(open, detail = %fresh.detail, "Camera analysis complete");
        let verdict = fresh.verdict();
        *cache = Some(fresh);

        Ok(verdict)
    }
}
