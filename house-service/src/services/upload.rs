use super::storage::Storage;
use metrics::counter;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub key: String,
    pub url: String,
}

/// Stores images under collision-free keys and hands back their public URL.
#[derive(Clone)]
pub struct ImageUploader {
    storage: Arc<dyn Storage>,
}

impl ImageUploader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadedImage, AppError> {
        let key = object_key(filename);
        let size = data.len();

        self.storage
            .put(&key, data, content_type)
            .await
            .map_err(|e| {
                tracing::error!(key = %key, "Failed to store image: {}", e);
                e
            })?;

        counter!("images_uploaded_total").increment(1);
        tracing::info!(key = %key, size = size, content_type = %content_type, "Image uploaded");

        Ok(UploadedImage {
            url: self.storage.public_url(&key),
            key,
        })
    }
}

/// `<random uuid>-<filename>`, so same-named uploads never collide.
pub fn object_key(filename: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::LocalStorage;

    #[test]
    fn object_key_ends_with_filename() {
        let key = object_key("photo.jpg");
        assert!(key.ends_with("-photo.jpg"));
        assert!(Uuid::parse_str(&key[..36]).is_ok());
    }

    #[tokio::test]
    async fn same_filename_uploads_get_distinct_urls() {
        let dir = format!("target/test-storage-{}", Uuid::new_v4());
        let storage = LocalStorage::new(&dir, "http://cdn.example.com/files")
            .await
            .unwrap();
        let uploader = ImageUploader::new(Arc::new(storage));

        let first = uploader
            .upload(vec![1, 2, 3], "photo.jpg", "image/jpeg")
            .await
            .unwrap();
        let second = uploader
            .upload(vec![4, 5, 6], "photo.jpg", "image/jpeg")
            .await
            .unwrap();

        assert_ne!(first.key, second.key);
        assert_ne!(first.url, second.url);
        for image in [&first, &second] {
            assert!(image.key.ends_with("-photo.jpg"));
            assert!(image.url.starts_with("http://cdn.example.com/files/"));
            assert!(image.url.ends_with(&image.key));
        }

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
