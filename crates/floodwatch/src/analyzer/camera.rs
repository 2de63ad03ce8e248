//! Camera image acquisition.
//!
//! Every camera is fetched independently. A camera that fails is logged and
//! left out; the caller decides what to do if nothing came back.

use futures::future::join_all;
use tracing::{debug, warn};

/// MIME type assumed when a camera does not send a usable `Content-Type`.
const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// One successfully fetched camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraImage {
    /// Where the frame came from.
    pub url: String,
    /// MIME type reported by the camera.
    pub mime_type: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

/// Why a single camera produced no image.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// Request failed or timed out.
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// Camera answered with something other than 200.
    #[error("status {0}")]
    Status(u16),
    /// Body could not be read.
    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Fetch a single camera frame.
///
/// # Errors
///
/// Returns an error on network failure, non-200 status or body read failure.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<CameraImage, CameraError> {
    let response = client.get(url).send().await.map_err(CameraError::Request)?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(CameraError::Status(response.status().as_u16()));
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();

    let data = response.bytes().await.map_err(CameraError::Body)?;

    Ok(CameraImage {
        url: url.to_string(),
        mime_type,
        data: data.to_vec(),
    })
}

/// Fetch every camera concurrently and keep the ones that succeeded.
///
/// Results keep camera order. Failures never abort the batch.
pub async fn fetch_images(client: &reqwest::Client, urls: &[String]) -> Vec<CameraImage> {
    let attempts = join_all(urls.iter().map(|url| fetch_image(client, url))).await;

    let images: Vec<CameraImage> = attempts
        .into_iter()
        .zip(urls)
        .filter_map(|(attempt, url)| match attempt {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(camera = %url, error = %e, "Skipping camera");
                None
            }
        })
        .collect();

    debug!(
        fetched = images.len(),
        configured = urls.len(),
        "Camera fetch complete"
    );
    images
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::test_support::{serve_camera, serve_static, serve_status, spawn};

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_image_reads_content_type() {
        let url = spawn(serve_static("png bytes".to_string(), "image/png")).await;
        let image = fetch_image(&client(), &url).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, b"png bytes");
        assert_eq!(image.url, url);
    }

    #[tokio::test]
    async fn test_fetch_image_non_200() {
        let url = spawn(serve_status(404)).await;
        let err = fetch_image(&client(), &url).await.unwrap_err();
        assert!(matches!(err, CameraError::Status(404)));
    }

    #[tokio::test]
    async fn test_fetch_images_skips_failures() {
        let hits = Arc::new(AtomicUsize::new(0));
        let good = spawn(serve_camera(hits.clone())).await;
        let broken = spawn(serve_status(500)).await;
        let urls = vec![
            format!("{broken}/cam0.jpg"),
            format!("{good}/cam1.jpg"),
            "http://127.0.0.1:9/cam2.jpg".to_string(),
            format!("{good}/cam3.jpg"),
        ];

        let images = fetch_images(&client(), &urls).await;
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, urls[1]);
        assert_eq!(images[1].url, urls[3]);
        assert_eq!(images[0].mime_type, "image/jpeg");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_images_all_fail() {
        let broken = spawn(serve_status(502)).await;
        let images = fetch_images(&client(), &[broken]).await;
        assert!(images.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_images_empty_list() {
        assert!(fetch_images(&client(), &[]).await.is_empty());
    }
}
