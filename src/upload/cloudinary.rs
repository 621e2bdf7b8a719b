// src/upload/cloudinary.rs

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use url::Url;

use super::{ImageHost, ImageUpload, UploadError, UploadedImage};
use crate::config::CloudinaryConfig;

const API_BASE: &str = "https://api.cloudinary.com/v1_1/";

/// Every upload lands under this folder on the CDN.
const ROOT_FOLDER: &str = "test-platform";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Unsigned uploads to Cloudinary using an upload preset.
pub struct CloudinaryHost {
    client: reqwest::Client,
    endpoint: Url,
    upload_preset: String,
}

impl CloudinaryHost {
    pub fn new(config: &CloudinaryConfig) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(API_BASE)?.join(&format!("{}/image/upload", config.cloud_name))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            upload_preset: config.upload_preset.clone(),
        })
    }

    #[cfg(test)]
    fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: ImageUpload, folder: &str) -> Result<UploadedImage, UploadError> {
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", format!("{}/{}", ROOT_FOLDER, folder));

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(UploadError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        // Only hand out references that are real absolute URLs.
        Url::parse(&body.secure_url).map_err(|e| UploadError::Transport(e.to_string()))?;

        Ok(UploadedImage {
            url: body.secure_url,
            public_id: body.public_id,
            width: body.width,
            height: body.height,
        })
    }
}
