//! Proof-of-payment uploads.

use super::error::ValidationError;

/// Largest receipt accepted (5 MiB).
pub const MAX_RECEIPT_BYTES: usize = 5 * 1024 * 1024;

/// An uploaded receipt image.
#[derive(Clone, PartialEq, Eq)]
pub struct Receipt {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receipt")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Receipt {
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check an optional attachment against the acceptance rules.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when no receipt is attached, it is
    /// empty, larger than [`MAX_RECEIPT_BYTES`], or not an `image/*` type.
    pub fn accept(receipt: Option<&Self>) -> Result<&Self, ValidationError> {
        let receipt = receipt.ok_or(ValidationError::ReceiptMissing)?;
        if receipt.is_empty() {
            return Err(ValidationError::ReceiptEmpty);
        }
        if receipt.len() > MAX_RECEIPT_BYTES {
            return Err(ValidationError::ReceiptTooLarge {
                size: receipt.len(),
                max: MAX_RECEIPT_BYTES,
            });
        }
        let is_image = receipt
            .content_type
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().to_ascii_lowercase().starts_with("image/"));
        if !is_image {
            return Err(ValidationError::ReceiptNotImage {
                content_type: receipt.content_type.clone(),
            });
        }
        Ok(receipt)
    }
}
