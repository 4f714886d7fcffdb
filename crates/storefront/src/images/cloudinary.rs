//! Cloudinary unsigned upload client.

use std::sync::Arc;

use async_trait::async_trait;
use mommypump_core::ContentId;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{ImageHost, ImageHostError, ImageTransform, ImageUpload, UploadedImage, build_image_url};
use crate::config::CloudinaryConfig;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    Failure { error: ErrorBody },
    Success(UploadedImage),
}

/// Client for Cloudinary uploads using an unsigned upload preset.
#[derive(Clone)]
pub struct CloudinaryClient {
    inner: Arc<CloudinaryClientInner>,
}

struct CloudinaryClientInner {
    client: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    #[must_use]
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            inner: Arc::new(CloudinaryClientInner {
                client: reqwest::Client::new(),
                cloud_name: config.cloud_name.clone(),
                upload_preset: config.upload_preset.clone(),
            }),
        }
    }

    /// Get the cloud name (safe to expose in pages).
    #[must_use]
    pub fn cloud_name(&self) -> &str {
        &self.inner.cloud_name
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.inner.cloud_name
        )
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    #[tracing::instrument(skip(self, image), fields(file = image.file_name, size = image.bytes.len()))]
    async fn upload(
        &self,
        image: ImageUpload<'_>,
        folder: &str,
    ) -> Result<UploadedImage, ImageHostError> {
        let file = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name.to_owned())
            .mime_str(image.content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.inner.upload_preset.clone())
            .text("folder", folder.to_owned());

        let response = self
            .inner
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<UploadResponse>(&text) {
            Ok(UploadResponse::Success(uploaded)) => {
                tracing::debug!(content_id = %uploaded.content_id, "Image uploaded");
                Ok(uploaded)
            }
            Ok(UploadResponse::Failure { error }) => Err(ImageHostError::Rejected(error.message)),
            Err(_) if !status.is_success() => Err(ImageHostError::Rejected(format!(
                "upload failed ({status}): {text}"
            ))),
            Err(e) => Err(ImageHostError::Parse(e)),
        }
    }

    fn image_url(&self, content_id: &ContentId, transform: &ImageTransform) -> String {
        build_image_url(&self.inner.cloud_name, content_id, transform)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_and_error_bodies() {
        let ok: UploadResponse = serde_json::from_str(
            r#"{"public_id":"receipts/abc","secure_url":"https://res.cloudinary.com/demo/image/upload/v1/receipts/abc.jpg","format":"jpg","width":800,"height":600,"bytes":1234}"#,
        )
        .unwrap();
        match ok {
            UploadResponse::Success(img) => {
                assert_eq!(img.content_id.as_str(), "receipts/abc");
                assert_eq!(img.width, Some(800));
            }
            UploadResponse::Failure { .. } => panic!("expected success"),
        }

        let err: UploadResponse =
            serde_json::from_str(r#"{"error":{"message":"Upload preset not found"}}"#).unwrap();
        assert!(
            matches!(err, UploadResponse::Failure { error } if error.message == "Upload preset not found")
        );
    }

    #[test]
    fn urls_use_the_configured_cloud() {
        let client = CloudinaryClient::new(&CloudinaryConfig {
            cloud_name: "mommypump".to_owned(),
            upload_preset: "unsigned".to_owned(),
        });
        assert_eq!(client.cloud_name(), "mommypump");
        assert_eq!(
            client.upload_url(),
            "https://api.cloudinary.com/v1_1/mommypump/image/upload"
        );
        assert!(
            client
                .image_url(&ContentId::new("p"), &ImageTransform::square(100))
                .starts_with("https://res.cloudinary.com/mommypump/")
        );
    }
}
