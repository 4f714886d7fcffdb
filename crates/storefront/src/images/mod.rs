//! Image hosting.
//!
//! Product photos and payment receipts live on Cloudinary. Documents store
//! only the returned content id; display URLs are rebuilt from it with
//! [`build_image_url`].
//!
//! # Sizes used by the pages
//!
//! | Where | Transform |
//! |---|---|
//! | Product cards | 400 × 400 |
//! | Product detail | 600 × 600 |
//! | Gallery thumbnails | 100 × 100 |

mod cloudinary;
#[cfg(any(test, feature = "test-support"))]
mod memory;

use async_trait::async_trait;
use mommypump_core::ContentId;
use serde::Deserialize;
use thiserror::Error;

pub use cloudinary::CloudinaryClient;
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryImageHost;

/// Folder receipts are uploaded into.
pub const RECEIPTS_FOLDER: &str = "receipts";

/// Errors that can occur when talking to the image host.
#[derive(Debug, Error)]
pub enum ImageHostError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The host rejected the upload.
    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// A file to upload.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    #[serde(rename = "public_id")]
    pub content_id: ContentId,
    #[serde(rename = "secure_url")]
    pub url: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A store for uploaded images.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload an image into `folder`.
    async fn upload(
        &self,
        image: ImageUpload<'_>,
        folder: &str,
    ) -> Result<UploadedImage, ImageHostError>;

    /// Display URL for a stored image.
    fn image_url(&self, content_id: &ContentId, transform: &ImageTransform) -> String;
}

/// Delivery transformation applied when building an image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTransform {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: String,
    pub quality: String,
    pub format: String,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            crop: "fill".to_owned(),
            quality: "auto".to_owned(),
            format: "auto".to_owned(),
        }
    }
}

impl ImageTransform {
    /// A `size` × `size` fill crop.
    #[must_use]
    pub fn square(size: u32) -> Self {
        Self {
            width: Some(size),
            height: Some(size),
            ..Self::default()
        }
    }

    fn segment(&self) -> String {
        let mut segment = format!("f_{},q_{}", self.format, self.quality);
        if let Some(width) = self.width {
            segment.push_str(&format!(",w_{width}"));
        }
        if let Some(height) = self.height {
            segment.push_str(&format!(",h_{height}"));
        }
        if self.width.is_some() || self.height.is_some() {
            segment.push_str(&format!(",c_{}", self.crop));
        }
        segment
    }
}

/// Build a Cloudinary delivery URL.
///
/// ```
/// use mommypump_core::ContentId;
/// use mommypump_storefront::images::{ImageTransform, build_image_url};
///
/// let url = build_image_url("demo", &ContentId::new("pumps/s1"), &ImageTransform::square(400));
/// assert_eq!(
///     url,
///     "https://res.cloudinary.com/demo/image/upload/f_auto,q_auto,w_400,h_400,c_fill/pumps/s1"
/// );
/// ```
#[must_use]
pub fn build_image_url(cloud_name: &str, content_id: &ContentId, transform: &ImageTransform) -> String {
    format!(
        "https://res.cloudinary.com/{cloud_name}/image/upload/{}/{content_id}",
        transform.segment()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_transform_has_no_dimensions_or_crop() {
        let url = build_image_url("demo", &ContentId::new("a"), &ImageTransform::default());
        assert_eq!(url, "https://res.cloudinary.com/demo/image/upload/f_auto,q_auto/a");
    }

    #[test]
    fn single_dimension_still_crops() {
        let transform = ImageTransform {
            width: Some(100),
            crop: "thumb".to_owned(),
            quality: "80".to_owned(),
            format: "webp".to_owned(),
            ..ImageTransform::default()
        };
        let url = build_image_url("demo", &ContentId::new("receipts/x"), &transform);
        assert_eq!(
            url,
            "https://res.cloudinary.com/demo/image/upload/f_webp,q_80,w_100,c_thumb/receipts/x"
        );
    }
}
