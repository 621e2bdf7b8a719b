// src/upload/mod.rs

//! Image upload pipeline: validate, then hand the bytes to the image host.
//!
//! Compression is left to the host (the Cloudinary upload preset carries the
//! size and quality limits).

pub mod cloudinary;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{config::MAX_IMAGE_BYTES, error::AppError};

pub use cloudinary::CloudinaryHost;

const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// A file received from a client, not yet validated.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Stable reference returned by the image host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file selected")]
    Empty,

    #[error("Only JPG, PNG, WEBP allowed (got {0})")]
    UnsupportedType(String),

    #[error("File too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Image host is not configured")]
    NotConfigured,

    #[error("Upload failed: {0}")]
    Transport(String),

    #[error("Upload rejected by image host ({status}): {message}")]
    Provider { status: u16, message: String },
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Empty | UploadError::UnsupportedType(_) => {
                AppError::BadRequest(err.to_string())
            }
            UploadError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            UploadError::NotConfigured
            | UploadError::Transport(_)
            | UploadError::Provider { .. } => AppError::BadGateway(err.to_string()),
        }
    }
}

/// Sniffs the real format from the leading bytes.
fn sniff(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Accepts JPEG, PNG and WEBP up to 10 MiB. The declared content type must
/// be on the allow-list and agree with the file's magic bytes.
pub fn validate_image(image: &ImageUpload) -> Result<&'static str, UploadError> {
    if image.bytes.is_empty() {
        return Err(UploadError::Empty);
    }

    let declared = image.content_type.to_ascii_lowercase();
    if !ALLOWED_TYPES.contains(&declared.as_str()) {
        return Err(UploadError::UnsupportedType(image.content_type.clone()));
    }

    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(UploadError::TooLarge {
            size: image.bytes.len(),
            max: MAX_IMAGE_BYTES,
        });
    }

    let actual = sniff(&image.bytes)
        .ok_or_else(|| UploadError::UnsupportedType("unrecognised image data".to_string()))?;
    let declared = if declared == "image/jpg" { "image/jpeg" } else { declared.as_str() };
    if actual != declared {
        return Err(UploadError::UnsupportedType(format!(
            "{} declared, {} found",
            image.content_type, actual
        )));
    }

    Ok(actual)
}

/// Somewhere images can be stored and served from.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload, folder: &str) -> Result<UploadedImage, UploadError>;
}

#[derive(Clone)]
pub struct UploadPipeline {
    host: Option<Arc<dyn ImageHost>>,
}

impl UploadPipeline {
    pub fn new(host: Arc<dyn ImageHost>) -> Self {
        Self { host: Some(host) }
    }

    /// A pipeline that validates but has nowhere to send files.
    pub fn unconfigured() -> Self {
        Self { host: None }
    }

    pub async fn upload(
        &self,
        image: ImageUpload,
        folder: &str,
    ) -> Result<UploadedImage, UploadError> {
        let kind = validate_image(&image)?;
        tracing::debug!(
            file = %image.file_name,
            kind,
            bytes = image.bytes.len(),
            "Image validated"
        );

        let host = self.host.as_ref().ok_or(UploadError::NotConfigured)?;
        let uploaded = host.upload(image, folder).await?;
        tracing::info!(url = %uploaded.url, "Image uploaded");
        Ok(uploaded)
    }
}
