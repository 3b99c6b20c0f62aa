use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use tracing::{debug, trace};

use crate::error::{InvoiceOcrError, Result};

/// An image ready to be sent to a vision model.
///
/// Holds base64 text as supplied by the caller. That can be bare base64 or a
/// `data:<mime>;base64,` URL, possibly unpadded or with stray whitespace.
/// [`ImagePayload::normalized_base64`] produces the form the model server
/// expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data: String,
    mime_type: Option<String>,
}

impl ImagePayload {
    /// Wrap already-encoded base64 text or a data URL.
    pub fn from_base64(data: impl Into<String>) -> Self {
        let data = data.into();
        let mime_type = data
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(';'))
            .map(|(mime, _)| mime.to_string());
        Self { data, mime_type }
    }

    /// Encode raw image bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: Some(mime_type.into()),
        }
    }

    /// Read and encode an image file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        debug!(path = %path.display(), size = bytes.len(), "Read image file");
        Ok(Self::from_bytes(&bytes, mime_type_for_path(path)))
    }

    /// Mime type if known from construction or the data URL prefix.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Payload as supplied, before normalization.
    pub fn raw(&self) -> &str {
        &self.data
    }

    /// Strip whitespace and any data URL prefix, then pad to a multiple of 4.
    ///
    /// ```
    /// use invoice_ocr::ImagePayload;
    ///
    /// let payload = ImagePayload::from_base64(" data:image/png;base64,YWJjZA ");
    /// assert_eq!(payload.normalized_base64().unwrap(), "YWJjZA==");
    /// ```
    pub fn normalized_base64(&self) -> Result<String> {
        let mut cleaned: String = self.body().chars().filter(|c| !c.is_whitespace()).collect();
        if cleaned.is_empty() {
            return Err(empty_payload());
        }

        while cleaned.len() % 4 != 0 {
            cleaned.push('=');
        }
        trace!(len = cleaned.len(), "Normalized image payload");
        Ok(cleaned)
    }

    /// Check that there is image data to send, without building the
    /// normalized copy.
    pub fn validate(&self) -> Result<()> {
        if self.body().chars().all(char::is_whitespace) {
            return Err(empty_payload());
        }
        Ok(())
    }

    // base64 text after any data URL prefix
    fn body(&self) -> &str {
        let trimmed = self.data.trim();
        match trimmed.split_once(',') {
            Some((_, body)) => body,
            None => trimmed,
        }
    }

    /// Decode the payload back to bytes, validating the encoding.
    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.normalized_base64()?)
            .map_err(|e| InvoiceOcrError::InvalidPayload(e.to_string()))
    }
}

fn empty_payload() -> InvoiceOcrError {
    InvoiceOcrError::InvalidPayload("image payload is empty".to_string())
}

/// Best-effort mime type from a file extension.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_payloads() {
        assert!(ImagePayload::from_base64("YWJj").validate().is_ok());
        assert!(ImagePayload::from_base64("data:image/png;base64, \n ").validate().is_err());
        assert!(ImagePayload::from_bytes(b"", "image/png").validate().is_err());
    }

    #[test]
    fn test_from_bytes_encodes() {
        let payload = ImagePayload::from_bytes(b"abc", "image/png");
        assert_eq!(payload.normalized_base64().unwrap(), "YWJj");
        assert_eq!(payload.mime_type(), Some("image/png"));
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let payload = ImagePayload::from_base64("data:image/jpeg;base64,YWJj");
        assert_eq!(payload.mime_type(), Some("image/jpeg"));
        assert_eq!(payload.normalized_base64().unwrap(), "YWJj");
    }

    #[test]
    fn test_padding_is_added() {
        assert_eq!(
            ImagePayload::from_base64("YWJjZA").normalized_base64().unwrap(),
            "YWJjZA=="
        );
        assert_eq!(
            ImagePayload::from_base64("YWJjZGU").normalized_base64().unwrap(),
            "YWJjZGU="
        );
        assert_eq!(ImagePayload::from_base64("YWJjZGU").decode().unwrap(), b"abcde");
    }

    #[test]
    fn test_inner_whitespace_is_removed() {
        let payload = ImagePayload::from_base64("YWJj\nZGVm\r\n");
        assert_eq!(payload.normalized_base64().unwrap(), "YWJjZGVm");
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let err = ImagePayload::from_base64("data:image/png;base64,")
            .normalized_base64()
            .unwrap_err();
        assert!(matches!(err, InvoiceOcrError::InvalidPayload(_)));
    }

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path(Path::new("scan.PDF")), "application/pdf");
        assert_eq!(mime_type_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("noext")), "application/octet-stream");
    }
}
