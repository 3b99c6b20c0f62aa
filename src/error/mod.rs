use thiserror::Error;

/// Error types for the invoice-ocr library.
///
/// Only request-level failures show up here. A single malformed stream line or
/// a malformed field line is absorbed where it occurs and never becomes an error.
///
/// # Examples
///
/// ```
/// use invoice_ocr::{InvoiceOcrError, Result};
///
/// fn check_payload(b64: &str) -> Result<()> {
///     if b64.trim().is_empty() {
///         return Err(InvoiceOcrError::InvalidPayload("image payload is empty".into()));
///     }
///     Ok(())
/// }
///
/// match check_payload("") {
///     Err(InvoiceOcrError::InvalidPayload(msg)) => println!("Bad payload: {}", msg),
///     Err(e) => println!("Unexpected error: {}", e),
///     Ok(()) => println!("Payload accepted"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum InvoiceOcrError {
    /// The model server answered with a non-success status
    #[error("HTTP error! status: {status}, details: {details}")]
    Api { status: u16, details: String },

    /// The stream completed without any usable text
    #[error("No text was extracted from the image")]
    EmptyExtraction,

    /// The image payload could not be normalized or encoded
    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),

    /// A document could not be turned into an image
    #[error("{0}")]
    Conversion(String),

    /// The uploaded document type is not accepted
    #[error("Unsupported document type: {0}")]
    UnsupportedDocument(String),

    /// Operation timed out
    #[error("Timeout error")]
    Timeout,

    /// All attempts failed; wraps the last underlying error
    #[error("Failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<InvoiceOcrError>,
    },

    /// HTTP client error (from reqwest)
    #[cfg(feature = "ollama")]
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error (from serde_json)
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Filesystem error while reading an input document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InvoiceOcrError {
    /// The error that ended the last attempt, looking through `RetriesExhausted`.
    pub fn last_cause(&self) -> &InvoiceOcrError {
        match self {
            InvoiceOcrError::RetriesExhausted { source, .. } => source.last_cause(),
            other => other,
        }
    }
}

// HttpError, JsonError and Io wrap foreign errors without PartialEq and never
// compare equal.
impl PartialEq for InvoiceOcrError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Api {
                    status: a,
                    details: da,
                },
                Self::Api {
                    status: b,
                    details: db,
                },
            ) => a == b && da == db,
            (Self::EmptyExtraction, Self::EmptyExtraction) => true,
            (Self::InvalidPayload(a), Self::InvalidPayload(b)) => a == b,
            (Self::Conversion(a), Self::Conversion(b)) => a == b,
            (Self::UnsupportedDocument(a), Self::UnsupportedDocument(b)) => a == b,
            (Self::Timeout, Self::Timeout) => true,
            (
                Self::RetriesExhausted {
                    attempts: a,
                    source: sa,
                },
                Self::RetriesExhausted {
                    attempts: b,
                    source: sb,
                },
            ) => a == b && sa == sb,
            _ => false,
        }
    }
}

/// A specialized Result type for invoice-ocr operations.
pub type Result<T> = std::result::Result<T, InvoiceOcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message_names_status_and_details() {
        let err = InvoiceOcrError::Api {
            status: 500,
            details: "model not loaded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error! status: 500, details: model not loaded"
        );
    }

    #[test]
    fn test_retries_exhausted_wraps_last_cause() {
        let err = InvoiceOcrError::RetriesExhausted {
            attempts: 3,
            source: Box::new(InvoiceOcrError::EmptyExtraction),
        };
        assert_eq!(
            err.to_string(),
            "Failed after 3 attempts: No text was extracted from the image"
        );
        assert_eq!(err.last_cause(), &InvoiceOcrError::EmptyExtraction);
    }

    #[test]
    fn test_json_errors_never_compare_equal() {
        let a: InvoiceOcrError = serde_json::from_str::<u8>("x").unwrap_err().into();
        let b: InvoiceOcrError = serde_json::from_str::<u8>("x").unwrap_err().into();
        assert_ne!(a, b);
    }
}
