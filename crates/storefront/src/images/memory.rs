//! In-memory image host for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use mommypump_core::ContentId;

use super::{ImageHost, ImageHostError, ImageTransform, ImageUpload, UploadedImage, build_image_url};

/// Keeps uploads in a map. Can be told to reject uploads.
#[derive(Debug, Default)]
pub struct MemoryImageHost {
    uploads: Mutex<HashMap<ContentId, (String, usize)>>,
    counter: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryImageHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent uploads fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of stored uploads.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().map_or(0, |u| u.len())
    }

    /// Folder and size of a stored upload.
    #[must_use]
    pub fn upload(&self, id: &ContentId) -> Option<(String, usize)> {
        self.uploads.lock().ok()?.get(id).cloned()
    }
}

#[async_trait]
impl ImageHost for MemoryImageHost {
    async fn upload(
        &self,
        image: ImageUpload<'_>,
        folder: &str,
    ) -> Result<UploadedImage, ImageHostError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ImageHostError::Rejected("host unavailable".to_owned()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let content_id = ContentId::new(format!("{folder}/upload-{n}"));
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.insert(content_id.clone(), (folder.to_owned(), image.bytes.len()));
        }
        Ok(UploadedImage {
            url: self.image_url(&content_id, &ImageTransform::default()),
            content_id,
            format: None,
            width: None,
            height: None,
        })
    }

    fn image_url(&self, content_id: &ContentId, transform: &ImageTransform) -> String {
        build_image_url("test", content_id, transform)
    }
}
