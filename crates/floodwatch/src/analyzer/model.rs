//! Vision model abstraction.
//!
//! The analyzer only needs one capability from a generative model: take a
//! prompt plus images and return text. Keeping it behind a trait lets tests
//! swap in an in-memory double.

use thiserror::Error;

/// Errors returned by a vision model call.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The request could not be sent or the connection failed.
    #[error("model request failed: {0}")]
    Request(String),

    /// The model endpoint answered with a non-success status.
    #[error("model returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response could not be decoded.
    #[error("malformed model response: {0}")]
    Decode(String),

    /// The model answered but produced no text.
    #[error("empty response from model")]
    EmptyResponse,
}

/// One piece of a multi-part model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Natural-language instruction.
    Text(String),
    /// Raw image bytes with their MIME type.
    Image {
        /// MIME type, e.g. `image/jpeg`.
        mime_type: String,
        /// The image payload.
        data: Vec<u8>,
    },
}

impl Part {
    /// Check if this part is an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// A single multi-part request: instruction first, then images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Ordered request parts.
    pub parts: Vec<Part>,
}

impl GenerateRequest {
    /// Start a request with an instruction.
    #[must_use]
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(prompt.into())],
        }
    }

    /// Append an image part.
    pub fn push_image(&mut self, mime_type: impl Into<String>, data: Vec<u8>) {
        self.parts.push(Part::Image {
            mime_type: mime_type.into(),
            data,
        });
    }

    /// Number of image parts.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_image()).count()
    }
}

/// A generative model that can look at images.
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync + std::fmt::Debug {
    /// Send one request and return the model's text reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or yields no usable text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ModelError>;
}
