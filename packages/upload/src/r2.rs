//! Image store on Cloudflare R2.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `CLOUDFLARE_ACCOUNT_ID` | Yes | Cloudflare account ID (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | Yes | S3-compatible access key for R2 |
//! | `R2_SECRET_ACCESS_KEY` | Yes | S3-compatible secret key for R2 |
//! | `R2_BUCKET` | Yes | Bucket receiving report images |
//! | `R2_PUBLIC_URL` | Yes | Public base URL the bucket is served from |

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};

use crate::{ImageFormat, ImageStore, UploadError, object_name, require_env};

/// Key prefix for report images inside the bucket.
const KEY_PREFIX: &str = "reports";

/// Uploads images to an R2 bucket and returns their public URL.
pub struct R2ImageStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_url: String,
}

impl R2ImageStore {
    /// Creates a new R2 image store from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::MissingEnv`] if any required variable is unset.
    pub fn from_env() -> Result<Self, UploadError> {
        let account_id = require_env("CLOUDFLARE_ACCOUNT_ID")?;
        let access_key = require_env("R2_ACCESS_KEY_ID")?;
        let secret_key = require_env("R2_SECRET_ACCESS_KEY")?;
        let bucket = require_env("R2_BUCKET")?;
        let public_url = require_env("R2_PUBLIC_URL")?;

        let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com");
        let creds = Credentials::new(&access_key, &secret_key, None, None, "r2-env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageStore for R2ImageStore {
    async fn store(&self, format: ImageFormat, bytes: Vec<u8>) -> Result<String, UploadError> {
        let key = format!("{KEY_PREFIX}/{}", object_name(format));
        let size = bytes.len();
        let body = aws_sdk_s3::primitives::ByteStream::from(bytes);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(format.content_type())
            .send()
            .await
            .map_err(|e| UploadError::Upload {
                bucket: self.bucket.clone(),
                key: key.clone(),
                source: Box::new(e),
            })?;

        log::info!("Uploaded {key} ({size} bytes)");
        Ok(format!("{}/{key}", self.public_url))
    }
}
