//! invoice-ocr: structured invoice field extraction with a local vision model
//!
//! # Overview
//!
//! invoice-ocr sends an invoice image to an Ollama vision model, streams the
//! reply, and turns the model's loosely formatted `Field: value` text into a
//! fixed set of 13 invoice fields. Fields the model could not find are
//! reported as `"not available"` rather than left out.
//!
//! Key features:
//! - Multilingual extraction prompt built from the same field list the parser uses
//! - Incremental NDJSON streaming with a progress callback
//! - Tolerant parsing: markdown cleanup plus exact and fuzzy field-name matching
//! - Bounded retry with linear backoff
//! - Upload session with PDF rasterization hook and in-memory history
//!
//! # Quick Start
//!
//! ```no_run
//! use invoice_ocr::{ImagePayload, InvoiceExtractor, InvoiceField, OllamaClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OllamaClient::new().model("llama3.2-vision");
//!     let payload = ImagePayload::from_file("invoice.png").await?;
//!
//!     let fields = client
//!         .extract(&payload, &mut |text: &str| eprint!("\r{} chars", text.len()))
//!         .await?;
//!
//!     println!("Invoice number: {}", fields.get(InvoiceField::InvoiceNumber));
//!     println!("{}", serde_json::to_string_pretty(&fields)?);
//!     Ok(())
//! }
//! ```
mod backend;
mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod model;
pub mod parser;
pub mod prompt;
pub mod session;

// Re-exports for convenience
pub use error::{InvoiceOcrError, Result};
pub use model::{History, HistoryEntry, InvoiceField, InvoiceFields, NOT_AVAILABLE};
pub use parser::parse_invoice_response;
pub use prompt::extraction_prompt;
pub use session::{Document, InvoiceSession, ProcessingStep, Rasterizer, StepCallback};

pub use backend::{
    ExtractionOutput, ImagePayload, InvoiceExtractor, NdjsonDecoder, ProgressCallback,
    RetryController, RetryPolicy, StreamEvent, StreamOutcome, TokenUsage, consume_stream,
    mime_type_for_path,
};

#[cfg(feature = "ollama")]
pub use backend::{OllamaClient, OllamaConfig};
