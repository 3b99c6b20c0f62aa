pub mod client;
pub mod media;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod retry;
pub mod stream;
pub mod usage;
#[cfg(feature = "ollama")]
mod utils;

pub use client::InvoiceExtractor;
pub use media::{ImagePayload, mime_type_for_path};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaClient, OllamaConfig};
pub use retry::{RetryController, RetryPolicy};
pub use stream::{NdjsonDecoder, ProgressCallback, StreamEvent, StreamOutcome, consume_stream};
pub use usage::{ExtractionOutput, TokenUsage};
#[cfg(feature = "ollama")]
pub(crate) use utils::{check_response_status, handle_http_error};
