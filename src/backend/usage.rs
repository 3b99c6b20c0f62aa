use crate::model::InvoiceFields;

/// Token usage reported by the model server on the final stream event.
///
/// Ollama reports `prompt_eval_count` and `eval_count` only when the stream
/// completes normally, so usage is optional on every result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUsage {
    /// The model used for this request
    pub model: String,
    /// Number of tokens in the input/prompt
    pub input_tokens: u64,
    /// Number of tokens in the output/completion
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(model: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            model: model.into(),
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used (input + output)
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Result of an extraction together with the text it was parsed from.
///
/// # Example
///
/// ```no_run
/// use invoice_ocr::{ImagePayload, InvoiceField, OllamaClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OllamaClient::new();
/// let payload = ImagePayload::from_file("invoice.png").await?;
/// let output = client.extract_with_metadata(&payload, &mut |_: &str| {}).await?;
///
/// println!("Currency: {}", output.fields.get(InvoiceField::Currency));
/// println!("Raw reply: {}", output.raw_text);
/// if let Some(usage) = &output.usage {
///     println!("Used {} total tokens", usage.total_tokens());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// Parsed fields
    pub fields: InvoiceFields,
    /// Model reply exactly as streamed, before cleanup
    pub raw_text: String,
    /// Token usage information (if the server reported it)
    pub usage: Option<TokenUsage>,
}

impl ExtractionOutput {
    pub fn new(fields: InvoiceFields, raw_text: String, usage: Option<TokenUsage>) -> Self {
        Self {
            fields,
            raw_text,
            usage,
        }
    }
}
