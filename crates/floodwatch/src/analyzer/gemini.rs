//! Gemini `generateContent` client.
//!
//! Images are sent inline as base64 alongside the instruction in a single
//! user turn. Only the first text part of the first candidate is used.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::{GenerateRequest, ModelError, Part, VisionModel};
use crate::error::{Error, Result};

/// Default REST endpoint for the Gemini API.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: Blob<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

fn to_wire(request: &GenerateRequest) -> GenerateContentRequest<'_> {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => WirePart::Text { text },
            Part::Image { mime_type, data } => WirePart::Inline {
                inline_data: Blob {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                },
            },
        })
        .collect();

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// A [`VisionModel`] backed by the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client for `model` at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// The model name requests are sent to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait::async_trait]
impl VisionModel for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> std::result::Result<String, ModelError> {
        debug!(
            model = %self.model,
            images = request.image_count(),
            "Sending generateContent request"
        );

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&to_wire(request))
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini returned an error");
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        parsed
            .first_text()
            .filter(|text| !text.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve_static, serve_status, spawn};

    #[test]
    fn test_wire_format() {
        let mut req = GenerateRequest::with_prompt("is it closed?");
        req.push_image("image/jpeg", b"abc".to_vec());

        let json = serde_json::to_value(to_wire(&req)).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "is it closed?");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "YWJj");
    }

    #[test]
    fn test_first_text() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"OPEN: clear"},{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.first_text().as_deref(), Some("OPEN: clear"));
    }

    #[test]
    fn test_first_text_missing() {
        for body in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
        ] {
            let resp: GenerateContentResponse = serde_json::from_str(body).unwrap();
            assert!(resp.first_text().is_none(), "expected no text for {body}");
        }
    }

    #[test]
    fn test_url_and_debug_hide_key() {
        let client = GeminiClient::new(
            "https://api.test/v1beta/",
            "gemini-test",
            "secret-key",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url(),
            "https://api.test/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(client.model(), "gemini-test");
        assert!(!format!("{client:?}").contains("secret-key"));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"CLOSED: barricades across lanes"}]}}]}"#;
        let endpoint = spawn(serve_static(body.to_string(), "application/json")).await;
        let client =
            GeminiClient::new(endpoint, "m", "k", Duration::from_secs(5)).unwrap();

        let text = client
            .generate(&GenerateRequest::with_prompt("p"))
            .await
            .unwrap();
        assert_eq!(text, "CLOSED: barricades across lanes");
    }

    #[tokio::test]
    async fn test_generate_empty_candidates() {
        let endpoint = spawn(serve_static(r#"{"candidates":[]}"#.to_string(), "application/json")).await;
        let client =
            GeminiClient::new(endpoint, "m", "k", Duration::from_secs(5)).unwrap();

        let err = client
            .generate(&GenerateRequest::with_prompt("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_generate_http_error() {
        let endpoint = spawn(serve_status(429)).await;
        let client =
            GeminiClient::new(endpoint, "m", "k", Duration::from_secs(5)).unwrap();

        let err = client
            .generate(&GenerateRequest::with_prompt("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Status { status: 429, .. }));
    }
}
