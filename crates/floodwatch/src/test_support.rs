//! Local HTTP fixtures and fakes shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::Router;
use tokio::net::TcpListener;

use crate::analyzer::{GenerateRequest, ModelError, VisionModel};

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A server that answers every request with `body`.
pub fn serve_static(body: String, content_type: &'static str) -> Router {
    Router::new().fallback(move || {
        let body = body.clone();
        async move { ([(header::CONTENT_TYPE, content_type)], body) }
    })
}

/// A server that answers every request with an empty body and `code`.
pub fn serve_status(code: u16) -> Router {
    Router::new().fallback(move || async move {
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// A camera that returns a fixed JPEG payload and counts its hits.
pub fn serve_camera(hits: Arc<AtomicUsize>) -> Router {
    Router::new().fallback(move || {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            (
                [(header::CONTENT_TYPE, "image/jpeg")],
                b"fake image data".to_vec(),
            )
        }
    })
}

/// Build an RSS 2.0 document from `(title, pubDate)` pairs.
pub fn rss(items: &[(&str, Option<&str>)]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>test feed</title><link>http://localhost</link><description>road alerts</description>"#,
    );
    for (i, (title, published)) in items.iter().enumerate() {
        out.push_str("<item>");
        out.push_str(&format!("<title>{title}</title>"));
        out.push_str(&format!("<link>http://localhost/alert/{i}</link>"));
        if let Some(published) = published {
            out.push_str(&format!("<pubDate>{published}</pubDate>"));
        }
        out.push_str("</item>");
    }
    out.push_str("</channel></rss>");
    out
}

/// A vision model double that returns a canned reply and counts calls.
#[derive(Debug)]
pub struct FakeModel {
    reply: std::result::Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
    images_seen: AtomicUsize,
}

impl FakeModel {
    /// A model that always answers with `text`.
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            images_seen: AtomicUsize::new(0),
        })
    }

    /// A model whose every call fails.
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            images_seen: AtomicUsize::new(0),
        })
    }

    /// A model that answers with `text` after `delay`.
    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay,
            calls: AtomicUsize::new(0),
            images_seen: AtomicUsize::new(0),
        })
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of images in the most recent request.
    pub fn images_seen(&self) -> usize {
        self.images_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images_seen
            .store(request.image_count(), Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(ModelError::Request(message.clone())),
        }
    }
}
