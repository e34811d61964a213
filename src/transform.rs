//! # AI Image Transform
//!
//! The generative step of the booth: a captured still plus a prompt go out, a
//! restyled image comes back. The service itself is external; the pipeline only
//! sees the [`ImageTransformer`] trait.
//!
//! [`HttpTransformer`] talks to a JSON endpoint:
//!
//! ```text
//! POST <endpoint>
//! { "model": "...", "prompt": "...", "image": "data:image/jpeg;base64,..." }
//!
//! 200 { "image": "data:image/png;base64,..." }
//! 4xx/5xx { "error": "..." }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{DataUrl, EncodedImage};
use crate::error::{BoothResult, PhotoboothError};

/// Image model requested when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub model: String,
    pub prompt: String,
    pub input_image: EncodedImage,
}

/// External AI image transform.
#[async_trait]
pub trait ImageTransformer: Send + Sync {
    /// Restyle `request.input_image`. Failures are reported as
    /// [`PhotoboothError::Transform`] with a readable reason.
    async fn transform(&self, request: TransformRequest) -> BoothResult<EncodedImage>;
}

#[derive(Serialize)]
struct TransformBody<'a> {
    model: &'a str,
    prompt: &'a str,
    image: &'a str,
}

#[derive(Deserialize)]
struct TransformReply {
    image: Option<String>,
    error: Option<String>,
}

/// [`ImageTransformer`] backed by an HTTP JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransformer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransformer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> BoothResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ImageTransformer for HttpTransformer {
    async fn transform(&self, request: TransformRequest) -> BoothResult<EncodedImage> {
        let image = request.input_image.to_data_url();
        let body = TransformBody {
            model: &request.model,
            prompt: &request.prompt,
            image: image.as_str(),
        };

        debug!(endpoint = %self.endpoint, model = %request.model, "Requesting AI transform");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| PhotoboothError::transform(None, e.to_string()))?;

        let status = response.status();
        let reply: TransformReply = response
            .json()
            .await
            .map_err(|e| PhotoboothError::transform(Some(status.as_u16()), format!("invalid reply: {}", e)))?;
        decode_reply(status, reply)
    }
}

fn decode_reply(status: reqwest::StatusCode, reply: TransformReply) -> BoothResult<EncodedImage> {
    if !status.is_success() {
        let reason = reply.error.unwrap_or_else(|| status.to_string());
        return Err(PhotoboothError::transform(Some(status.as_u16()), reason));
    }

    let image = reply.image.ok_or_else(|| {
        PhotoboothError::transform(
            Some(status.as_u16()),
            reply.error.unwrap_or_else(|| "reply carries no image".to_string()),
        )
    })?;
    let url = DataUrl::parse(image).map_err(|e| PhotoboothError::transform(Some(status.as_u16()), e.to_string()))?;
    EncodedImage::from_data_url(&url)
}
