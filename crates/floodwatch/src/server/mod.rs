//! HTTP server for the status page.
//!
//! Routes:
//! - `GET /` renders the HTML page.
//! - `GET /status.json` returns the merged record with the road name.
//!
//! Every request runs a fresh status determination bounded by the configured
//! deadline. A feed failure becomes a 500 with the reason in the body.

mod page;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::merger::StatusMerger;
use crate::status::StatusRecord;

pub use page::{escape_html, format_published, render};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    merger: Arc<StatusMerger>,
    tz: Tz,
    deadline: Duration,
}

impl AppState {
    /// Create handler state.
    #[must_use]
    pub fn new(merger: StatusMerger, tz: Tz, deadline: Duration) -> Self {
        Self {
            merger: Arc::new(merger),
            tz,
            deadline,
        }
    }

    async fn status(&self) -> std::result::Result<StatusRecord, Response> {
        self.merger
            .status_within(self.deadline)
            .await
            .map_err(|e| internal_error(&e))
    }
}

/// A status record labelled with its road, as served by `/status.json`.
#[derive(Debug, Serialize)]
pub struct StatusReport<'a> {
    /// The tracked road.
    pub road: &'a str,
    /// The merged status.
    #[serde(flatten)]
    pub record: StatusRecord,
}

/// Log the failure and turn it into a 500 response.
fn internal_error(err: &Error) -> Response {
    let message = if err.is_feed_error() {
        format!("failed to fetch the road alert feed: {err}")
    } else {
        format!("internal error: {err}")
    };
    error!("{message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}

/// GET /
async fn index(State(state): State<AppState>) -> Response {
    match state.status().await {
        Ok(record) => Html(render(state.merger.road(), &record, state.tz)).into_response(),
        Err(response) => response,
    }
}

/// GET /status.json
async fn status_json(State(state): State<AppState>) -> Response {
    match state.status().await {
        Ok(record) => Json(StatusReport {
            road: state.merger.road(),
            record,
        })
        .into_response(),
        Err(response) => response,
    }
}

/// The client address, preferring `X-Forwarded-For` when behind a proxy.
fn client_addr(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let forwarded: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if !forwarded.is_empty() {
        return forwarded.join(" ");
    }
    remote.map_or_else(|| "-".to_string(), |addr| addr.to_string())
}

async fn log_request(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_addr(request.headers(), remote);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    info!(
        client = %client,
        method = %request.method(),
        uri = %request.uri(),
        user_agent = %user_agent,
        "Request"
    );
    next.run(request).await
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/status.json", get(status_json))
        .with_state(state)
        .layer(middleware::from_fn(log_request))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Serve the status page until interrupted.
///
/// # Errors
///
/// Returns an error if the configuration is unusable, the address cannot be
/// bound, or the server fails.
pub async fn run(config: &Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let merger = StatusMerger::from_config(config)?;
    let road = merger.road().to_string();
    let override_status = merger.override_status();
    let state = AppState::new(merger, config.tz()?, config.request_deadline());

    let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
        addr: addr.to_string(),
        source,
    })?;

    info!(
        %addr,
        road = %road,
        override_status = %override_status,
        "Listening"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use axum::http::HeaderValue;

    use super::*;
    use crate::analyzer::{TrafficAnalyzer, DEFAULT_CACHE_TTL};
    use crate::feed::FeedStatusExtractor;
    use crate::logging::init_test_logging;
    use crate::status::Override;
    use crate::test_support::{rss, serve_camera, serve_static, serve_status, spawn, FakeModel};

    async fn serve_floodwatch(
        override_status: Override,
        feed_url: &str,
        analyzer: TrafficAnalyzer,
    ) -> String {
        init_test_logging();
        let extractor =
            FeedStatusExtractor::new(feed_url, "124th", Duration::from_secs(5)).unwrap();
        let merger = StatusMerger::new(override_status, extractor, Arc::new(analyzer));
        let state = AppState::new(
            merger,
            chrono_tz::America::Los_Angeles,
            Duration::from_secs(10),
        );
        spawn(router(state)).await
    }

    async fn feed_with(items: &[(&str, Option<&str>)]) -> String {
        spawn(serve_static(rss(items), "application/rss+xml")).await
    }

    async fn get_text(url: &str) -> (u16, String) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_default_open() {
        let feed = feed_with(&[]).await;
        let base = serve_floodwatch(Override::None, &feed, TrafficAnalyzer::disabled()).await;

        let (status, body) = get_text(&base).await;
        assert_eq!(status, 200);
        assert!(body.contains("124th is Open"));
    }

    #[tokio::test]
    async fn test_explicitly_closed() {
        let feed = feed_with(&[("Closed - 124th", None)]).await;
        let base = serve_floodwatch(Override::None, &feed, TrafficAnalyzer::disabled()).await;

        let (status, body) = get_text(&base).await;
        assert_eq!(status, 200);
        assert!(body.contains("124th is Closed"));
        assert!(body.contains("Closed - 124th"));
        assert!(body.contains("http://localhost/alert/0"));
    }

    #[tokio::test]
    async fn test_latest_update_wins() {
        let feed = feed_with(&[
            ("Open - Some other road", None),
            ("Closed - 124th", None),
            ("Open - 124th", None),
        ])
        .await;
        let base = serve_floodwatch(Override::None, &feed, TrafficAnalyzer::disabled()).await;

        let (_, body) = get_text(&base).await;
        assert!(body.contains("124th is Closed"));
    }

    #[tokio::test]
    async fn test_updated_at() {
        let feed = feed_with(&[("Closed - 124th", Some("Thu, 20 Nov 2025 10:00:00 GMT"))]).await;
        let base = serve_floodwatch(Override::None, &feed, TrafficAnalyzer::disabled()).await;

        let (_, body) = get_text(&base).await;
        assert!(body.contains("Updated at Thu, 20 Nov 2025 02:00:00 PST"));
    }

    #[tokio::test]
    async fn test_override() {
        let feed = feed_with(&[("Closed - 124th", None)]).await;
        let base = serve_floodwatch(Override::ForceOpen, &feed, TrafficAnalyzer::disabled()).await;

        let (status, body) = get_text(&base).await;
        assert_eq!(status, 200);
        assert!(body.contains("124th is Open"));
        assert!(!body.contains("Closed - 124th"));
    }

    #[tokio::test]
    async fn test_feed_failure_is_500() {
        let feed = spawn(serve_status(503)).await;
        let base = serve_floodwatch(Override::None, &feed, TrafficAnalyzer::disabled()).await;

        let (status, body) = get_text(&base).await;
        assert_eq!(status, 500);
        assert!(body.starts_with("failed to fetch the road alert feed:"));
        assert!(body.contains("503"));
    }

    #[tokio::test]
    async fn test_analysis_shown_on_page() {
        let feed = feed_with(&[("Closed - 124th", None)]).await;
        let cam = spawn(serve_camera(Arc::new(AtomicUsize::new(0)))).await;
        let model = FakeModel::replying("OPEN: Cars are driving through.");
        let analyzer = TrafficAnalyzer::new(
            model,
            "124th",
            vec![cam],
            DEFAULT_CACHE_TTL,
            Duration::from_secs(5),
        )
        .unwrap();
        let base = serve_floodwatch(Override::None, &feed, analyzer).await;

        let (_, body) = get_text(&base).await;
        assert!(body.contains("124th is Open"));
        assert!(body.contains("✨ Analysis: Cars are driving through."));
        assert!(body.contains("Updated at"));
    }

    #[tokio::test]
    async fn test_status_json() {
        let feed = feed_with(&[("Closed - 124th", Some("Thu, 20 Nov 2025 10:00:00 GMT"))]).await;
        let base = serve_floodwatch(Override::None, &feed, TrafficAnalyzer::disabled()).await;

        let response = reqwest::get(format!("{base}/status.json")).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["road"], "124th");
        assert_eq!(json["open"], false);
        assert_eq!(json["detail"], "Closed - 124th");
        assert_eq!(json["link"], "http://localhost/alert/0");
        assert_eq!(json["published_at"], "2025-11-20T10:00:00Z");
    }

    #[tokio::test]
    async fn test_status_json_feed_failure() {
        let feed = spawn(serve_status(500)).await;
        let base = serve_floodwatch(Override::None, &feed, TrafficAnalyzer::disabled()).await;

        let response = reqwest::get(format!("{base}/status.json")).await.unwrap();
        assert_eq!(response.status().as_u16(), 500);
    }

    #[test]
    fn test_client_addr_prefers_forwarded_for() {
        let remote: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_addr(&headers, Some(remote)), "10.0.0.1:5000");
        assert_eq!(client_addr(&headers, None), "-");

        headers.append("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.append("x-forwarded-for", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            client_addr(&headers, Some(remote)),
            "203.0.113.7 198.51.100.2"
        );
    }

    #[test]
    fn test_internal_error_feed_message() {
        let response = internal_error(&Error::feed_fetch("http://feed.test", "HTTP 503"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
