use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Image Storage Collaborator
// ============================================================================
//
// Object storage for service images lives outside this crate. The catalog
// only needs to put, delete and resolve keys.
//
// ============================================================================

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Public URL for a stored key
    fn url(&self, key: &str) -> String;
}

/// Build a unique object key for an uploaded file, keeping its extension.
pub fn image_key(filename: &str) -> String {
    let ext = extension(filename).unwrap_or("bin");
    format!("{}.{}", Uuid::new_v4().simple(), ext)
}

pub fn guess_content_type(filename: &str) -> &'static str {
    match extension(filename).map(str::to_ascii_lowercase).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn extension(filename: &str) -> Option<&str> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && !ext.contains('/'))
}

/// In-process image store, used by the demo binary and tests.
pub struct InMemoryImageStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredImage>>,
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl InMemoryImageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<StoredImage> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredImage { bytes, content_type: content_type.to_string() },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => anyhow::bail!("no such object: {}", key),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_key_keeps_extension() {
        let key = image_key("quadcopter.photo.PNG");
        assert!(key.ends_with(".PNG"));
        assert_eq!(key.len(), 32 + ".PNG".len());

        assert!(image_key("no_extension").ends_with(".bin"));
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(guess_content_type("a.jpg"), "image/jpeg");
        assert_eq!(guess_content_type("a.JPEG"), "image/jpeg");
        assert_eq!(guess_content_type("a.png"), "image/png");
        assert_eq!(guess_content_type("archive.tar"), "application/octet-stream");
        assert_eq!(guess_content_type("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_in_memory_store_put_url_delete() {
        let store = InMemoryImageStore::new("http://localhost:9000/images/");
        store.put("a.png", vec![1, 2, 3], "image/png").await.unwrap();

        assert_eq!(store.url("a.png"), "http://localhost:9000/images/a.png");
        assert_eq!(store.get("a.png").await.unwrap().content_type, "image/png");

        store.delete("a.png").await.unwrap();
        assert!(store.delete("a.png").await.is_err());
        assert_eq!(store.len().await, 0);
    }
}
