use crate::error::{InvoiceOcrError, Result};
use reqwest::Response;
use tracing::error;

/// Convert a reqwest error to an InvoiceOcrError, handling timeout errors specially.
pub fn handle_http_error(e: reqwest::Error, provider_name: &str) -> InvoiceOcrError {
    error!(error = %e, "HTTP request to {} failed", provider_name);
    if e.is_timeout() {
        InvoiceOcrError::Timeout
    } else {
        InvoiceOcrError::HttpError(e)
    }
}

/// Check HTTP response status and extract the server's detail text if unsuccessful.
pub async fn check_response_status(response: Response, provider_name: &str) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let details = response.text().await.unwrap_or_default();
        error!(
            status = %status,
            error = %details,
            "{} returned error response", provider_name
        );
        return Err(InvoiceOcrError::Api {
            status: status.as_u16(),
            details,
        });
    }
    Ok(response)
}
