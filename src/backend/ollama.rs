use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::backend::{
    ExtractionOutput, ImagePayload, InvoiceExtractor, ProgressCallback, RetryPolicy,
    check_response_status, consume_stream, handle_http_error,
};
use crate::error::Result;
use crate::model::InvoiceFields;
use crate::parser::{clean_model_output, parse_invoice_response};
use crate::prompt::extraction_prompt;

/// Ollama endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
/// Vision model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2-vision";

/// Configuration for the Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server, without the `/api/chat` path
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 2048,
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Streaming invoice extractor backed by an Ollama `/api/chat` endpoint.
///
/// Each call to [`extract_once`](InvoiceExtractor::extract_once) sends one
/// request and reads the newline-delimited JSON reply as it streams in.
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

// Ollama chat API request structures
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaClient {
    /// Create a client for the default local endpoint and model.
    #[instrument(name = "ollama_client_new")]
    pub fn new() -> Self {
        Self::with_config(OllamaConfig::default())
    }

    /// Create a client from an explicit configuration.
    pub fn with_config(config: OllamaConfig) -> Self {
        info!(
            endpoint = %config.endpoint,
            model = %config.model,
            "Creating Ollama client"
        );
        let client = build_http_client(&config);
        Self { config, client }
    }

    /// Create a client from `OLLAMA_HOST` and `INVOICE_OCR_MODEL`.
    ///
    /// Unset variables fall back to the defaults. A host without a scheme is
    /// treated as plain `http`.
    #[instrument(name = "ollama_client_from_env")]
    pub fn from_env() -> Self {
        let mut config = OllamaConfig::default();
        if let Ok(host) = std::env::var("OLLAMA_HOST")
            && !host.trim().is_empty()
        {
            config.endpoint = normalize_endpoint(&host);
        }
        if let Ok(model) = std::env::var("INVOICE_OCR_MODEL")
            && !model.trim().is_empty()
        {
            config.model = model.trim().to_string();
        }
        debug!(endpoint = %config.endpoint, model = %config.model, "Read configuration from environment");
        Self::with_config(config)
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Set the Ollama base URL
    #[instrument(skip(self))]
    pub fn endpoint(mut self, endpoint: impl Into<String> + std::fmt::Debug) -> Self {
        let endpoint = normalize_endpoint(&endpoint.into());
        debug!(previous = %self.config.endpoint, new = %endpoint, "Setting endpoint");
        self.config.endpoint = endpoint;
        self.client = build_http_client(&self.config);
        self
    }

    /// Set the model to use
    #[instrument(skip(self))]
    pub fn model(mut self, model: impl Into<String> + std::fmt::Debug) -> Self {
        let model = model.into();
        debug!(previous_model = %self.config.model, new_model = %model, "Setting model");
        self.config.model = model;
        self
    }

    /// Set the temperature (lower = more deterministic)
    #[instrument(skip(self))]
    pub fn temperature(mut self, temp: f32) -> Self {
        debug!(
            previous_temp = self.config.temperature,
            new_temp = temp,
            "Setting temperature"
        );
        self.config.temperature = temp;
        self
    }

    /// Set the maximum tokens to generate
    #[instrument(skip(self))]
    pub fn max_tokens(mut self, max: u32) -> Self {
        debug!(previous_max = self.config.max_tokens, new_max = max, "Setting max_tokens");
        self.config.max_tokens = max.max(1);
        self
    }

    /// Set the timeout for each HTTP request, including reading the stream.
    #[instrument(skip(self))]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        debug!(previous_timeout = ?self.config.timeout, new_timeout = ?timeout, "Setting timeout");
        self.config.timeout = Some(timeout);
        self.client = build_http_client(&self.config);
        self
    }

    /// Set the total number of attempts made by `extract` (minimum 1).
    #[instrument(skip(self))]
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        debug!(
            previous = self.config.retry.max_attempts,
            new = attempts,
            "Setting max_attempts"
        );
        self.config.retry = RetryPolicy::new(attempts, self.config.retry.base_delay);
        self
    }

    /// Set the backoff unit; attempt `n` is followed by `n × delay`.
    #[instrument(skip(self))]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        debug!(previous = ?self.config.retry.base_delay, new = ?delay, "Setting retry delay");
        self.config.retry.base_delay = delay;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.endpoint)
    }

    fn build_request(&self, payload: &ImagePayload) -> Result<ChatRequest> {
        let image = payload.normalized_base64()?;
        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: extraction_prompt(),
                images: vec![image],
            }],
            stream: true,
            options: ChatOptions {
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            },
        })
    }

    /// Run one extraction attempt and keep the raw reply and token usage.
    #[instrument(
        name = "ollama_extract",
        skip(self, payload, on_progress),
        fields(model = %self.config.model, endpoint = %self.config.endpoint)
    )]
    pub async fn extract_with_metadata(
        &self,
        payload: &ImagePayload,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<ExtractionOutput> {
        let request = self.build_request(payload)?;
        let url = self.chat_url();
        debug!(
            url = %url,
            image_len = request.messages[0].images[0].len(),
            prompt_len = request.messages[0].content.len(),
            temperature = request.options.temperature,
            max_tokens = request.options.max_tokens,
            "Sending chat request"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| handle_http_error(e, "Ollama"))?;
        let response = check_response_status(response, "Ollama").await?;

        debug!("Reading response stream");
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| handle_http_error(e, "Ollama")));
        let outcome = consume_stream(body, on_progress).await?;

        let cleaned = clean_model_output(&outcome.text);
        if cleaned.is_empty() {
            warn!(raw_len = outcome.text.len(), "Reply contained only markup");
        }
        let fields = parse_invoice_response(&cleaned);
        info!(
            available = fields.available_count(),
            raw_len = outcome.text.len(),
            "Extraction attempt complete"
        );

        Ok(ExtractionOutput::new(fields, outcome.text, outcome.usage))
    }
}

#[async_trait]
impl InvoiceExtractor for OllamaClient {
    async fn extract_once(
        &self,
        payload: &ImagePayload,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<InvoiceFields> {
        self.extract_with_metadata(payload, on_progress)
            .await
            .map(|output| output.fields)
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }
}

fn build_http_client(config: &OllamaConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    // system proxies never apply to a model server on this machine
    if is_loopback(&config.endpoint) {
        builder = builder.no_proxy();
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build reqwest client, using default");
        reqwest::Client::new()
    })
}

fn is_loopback(endpoint: &str) -> bool {
    let parsed = match url::Url::parse(endpoint) {
        Ok(u) => u,
        Err(_) => return false,
    };

    match parsed.host() {
        None => false,
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
    }
}

/// Parse an endpoint, assuming `http` when no scheme is given, and drop any
/// trailing slash so `/api/chat` can be appended.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    // "host:port" parses as scheme "host" with no authority
    let parsed = match url::Url::parse(endpoint) {
        Ok(u) if u.has_host() => Ok(u),
        _ => url::Url::parse(&format!("http://{}", endpoint)),
    };

    match parsed {
        Ok(u) => u.as_str().trim_end_matches('/').to_string(),
        Err(e) => {
            warn!(endpoint, error = %e, "Endpoint is not a valid URL, using it as given");
            endpoint.trim_end_matches('/').to_string()
        }
    }
}
