use async_trait::async_trait;

use crate::backend::{ImagePayload, ProgressCallback, RetryController, RetryPolicy};
use crate::error::Result;
use crate::model::InvoiceFields;

/// InvoiceExtractor defines the interface for anything that can turn an
/// invoice image into [`InvoiceFields`].
///
/// Implementors provide [`extract_once`](InvoiceExtractor::extract_once),
/// which makes a single attempt. Callers use
/// [`extract`](InvoiceExtractor::extract), which repeats `extract_once` under
/// the implementor's [`RetryPolicy`].
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use invoice_ocr::{ImagePayload, InvoiceExtractor, InvoiceField, OllamaClient};
///
/// let client = OllamaClient::new()
///     .endpoint("http://localhost:11434")
///     .model("llama3.2-vision");
///
/// let payload = ImagePayload::from_file("invoice.jpg").await?;
/// let fields = client
///     .extract(&payload, &mut |text: &str| println!("{} chars so far", text.len()))
///     .await?;
///
/// for (field, value) in fields.iter() {
///     println!("{}: {}", field, value);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait InvoiceExtractor: Send + Sync {
    /// Run a single extraction attempt.
    ///
    /// `on_progress` receives the cumulative model text after each streamed
    /// fragment.
    async fn extract_once(
        &self,
        payload: &ImagePayload,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<InvoiceFields>;

    /// Retry bounds applied by [`extract`](InvoiceExtractor::extract).
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Extract with bounded retry.
    ///
    /// Every attempt starts from scratch, so progress text restarts from
    /// empty on each retry. After the last failed attempt the error is
    /// [`InvoiceOcrError::RetriesExhausted`](crate::InvoiceOcrError::RetriesExhausted).
    async fn extract(
        &self,
        payload: &ImagePayload,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<InvoiceFields> {
        let mut retry = RetryController::new(self.retry_policy());
        loop {
            retry.begin_attempt();
            match self.extract_once(payload, &mut *on_progress).await {
                Ok(fields) => return Ok(retry.succeeded(fields)),
                Err(err) => retry.failed(err).await?,
            }
        }
    }
}
