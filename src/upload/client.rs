//! Multipart HTTP upload client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::{UploadRequest, UploadResponse, Uploader};
use crate::error::{BoothResult, PhotoboothError};

/// [`Uploader`] posting `multipart/form-data` to the booth server.
///
/// Fields: `file` (the bytes, named after the filename), `name`, and when set
/// `watermarkPosition`, `watermarkVariant`, `watermarkScale`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
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

    fn form(request: &UploadRequest) -> BoothResult<Form> {
        let part = Part::bytes(request.image.bytes().to_vec())
            .file_name(request.filename.clone())
            .mime_str(request.image.mime())?;
        let mut form = Form::new()
            .part("file", part)
            .text("name", request.filename.clone());

        let watermark = &request.watermark;
        if let Some(position) = watermark.position {
            form = form.text("watermarkPosition", position.as_str());
        }
        if let Some(variant) = watermark.variant {
            form = form.text("watermarkVariant", variant.as_str());
        }
        if let Some(scale) = watermark.scale {
            form = form.text("watermarkScale", scale.to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, request: UploadRequest) -> BoothResult<UploadResponse> {
        debug!(
            endpoint = %self.endpoint,
            filename = %request.filename,
            bytes = request.image.len(),
            "Starting upload"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(Self::form(&request)?)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "Upload response");
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(PhotoboothError::upload(&self.endpoint, Some(status.as_u16()), reason));
        }

        let reply: UploadResponse = response.json().await?;
        if reply.link().is_none() {
            return Err(PhotoboothError::upload(
                &self.endpoint,
                Some(status.as_u16()),
                "reply is missing success or directLink",
            ));
        }
        Ok(reply)
    }
}
