//! Image store on the local filesystem.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{ImageFormat, ImageStore, UploadError, object_name};

/// Writes images into a directory served at `public_prefix`.
pub struct LocalImageStore {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalImageStore {
    /// Creates the store, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>, public_prefix: &str) -> Result<Self, UploadError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, format: ImageFormat, bytes: Vec<u8>) -> Result<String, UploadError> {
        let name = object_name(format);
        let path = self.dir.join(&name);

        tokio::fs::write(&path, &bytes).await?;
        log::debug!("Stored {} bytes at {}", bytes.len(), path.display());

        Ok(format!("{}/{name}", self.public_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_file_and_returns_public_url() {
        let dir = std::env::temp_dir().join(format!("uploads-{}", uuid::Uuid::new_v4()));
        let store = LocalImageStore::new(&dir, "/uploads/").unwrap();

        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        let url = store.store(ImageFormat::Jpeg, bytes.clone()).await.unwrap();

        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".jpg"));

        let name = url.trim_start_matches("/uploads/");
        assert_eq!(tokio::fs::read(dir.join(name)).await.unwrap(), bytes);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
