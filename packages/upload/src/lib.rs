#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Image uploads attached to disaster reports.
//!
//! [`ImagePolicy`] decides whether an uploaded part is an acceptable image
//! (JPEG or PNG, declared content type and magic bytes in agreement, at
//! most [`MAX_IMAGE_BYTES`]). Accepted bytes are handed to an
//! [`ImageStore`], which returns the opaque URL recorded on the report.
//!
//! - [`local::LocalImageStore`] writes files under a directory that the
//!   HTTP server also serves.
//! - [`r2::R2ImageStore`] uploads to a Cloudflare R2 bucket through the S3
//!   API.

pub mod local;
pub mod r2;

use async_trait::async_trait;
use strum_macros::{AsRefStr, Display};

/// Largest accepted image, in bytes (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Errors that can occur while checking or storing an image.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The part is not an acceptable image. Maps to a client error.
    #[error("Invalid file: {reason}")]
    InvalidFile {
        /// Why the file was rejected.
        reason: String,
    },

    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O error writing local files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            reason: reason.into(),
        }
    }

    /// Whether the error is the caller's fault rather than a backend fault.
    #[must_use]
    pub const fn is_invalid_file(&self) -> bool {
        matches!(self, Self::InvalidFile { .. })
    }
}

/// Accepted image encodings. Displays as the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ImageFormat {
    #[strum(serialize = "jpg")]
    Jpeg,
    #[strum(serialize = "png")]
    Png,
}

impl ImageFormat {
    /// Canonical MIME type.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else {
            None
        }
    }
}

/// Acceptance rules for uploaded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePolicy {
    /// Largest accepted body, in bytes.
    pub max_bytes: usize,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
        }
    }
}

impl ImagePolicy {
    /// Checks an uploaded part and returns its format.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidFile`] if the part is empty, too large,
    /// declares an unsupported content type, or its contents do not match
    /// the declared type.
    pub fn check(
        &self,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<ImageFormat, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::invalid("file is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::invalid(format!(
                "file exceeds {} bytes",
                self.max_bytes
            )));
        }

        let declared = content_type
            .and_then(ImageFormat::from_content_type)
            .ok_or_else(|| UploadError::invalid("only JPEG and PNG images are allowed"))?;

        match ImageFormat::sniff(bytes) {
            Some(actual) if actual == declared => Ok(actual),
            _ => Err(UploadError::invalid(format!(
                "file contents are not a valid {}",
                declared.content_type()
            ))),
        }
    }
}

/// Destination for accepted images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists the image and returns the URL clients fetch it from.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] if the backend rejects the write.
    async fn store(&self, format: ImageFormat, bytes: Vec<u8>) -> Result<String, UploadError>;
}

/// Random object name with the format's extension.
fn object_name(format: ImageFormat) -> String {
    format!("{}.{format}", uuid::Uuid::new_v4())
}

fn require_env(name: &str) -> Result<String, UploadError> {
    std::env::var(name).map_err(|_| UploadError::MissingEnv {
        name: name.to_string(),
    })
}
