//! Incremental decoding of Ollama's newline-delimited JSON chat stream.
//!
//! The response body arrives in arbitrary chunks. [`NdjsonDecoder`] turns
//! them into [`StreamEvent`]s. [`consume_stream`] appends each content
//! fragment to the running text and reports progress after every fragment.

use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::backend::TokenUsage;
use crate::error::{InvoiceOcrError, Result};

/// Callback receiving the cumulative text after every content fragment.
pub type ProgressCallback<'f> = dyn FnMut(&str) + Send + 'f;

/// Message part of a chat stream event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// One line of the chat stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl StreamEvent {
    /// Text fragment carried by this event, if any.
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
    }
}

/// Splits a byte stream into newline-delimited JSON events.
///
/// Complete lines are decoded as soon as their newline arrives. A trailing
/// segment without a newline is decoded immediately when it already forms a
/// whole event, and otherwise held until the next chunk completes it.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the events it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }

        if !self.pending.is_empty()
            && let Some(event) = decode_complete(&self.pending)
        {
            self.pending.clear();
            events.push(event);
        }

        events
    }

    /// Flush whatever remains once the stream has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let tail = std::mem::take(&mut self.pending);
        decode_line(&tail)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<StreamEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, line = %text, "Error parsing stream line");
            None
        }
    }
}

fn decode_complete(segment: &[u8]) -> Option<StreamEvent> {
    let text = std::str::from_utf8(segment).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    serde_json::from_str::<StreamEvent>(text).ok()
}

/// Everything gathered from one completed stream.
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Accumulates content fragments and reports the running total.
pub struct StreamAccumulator<'a, 'f> {
    text: String,
    fragments: usize,
    usage: Option<TokenUsage>,
    on_progress: &'a mut ProgressCallback<'f>,
}

impl<'a, 'f> StreamAccumulator<'a, 'f> {
    pub fn new(on_progress: &'a mut ProgressCallback<'f>) -> Self {
        Self {
            text: String::new(),
            fragments: 0,
            usage: None,
            on_progress,
        }
    }

    pub fn apply(&mut self, event: StreamEvent) {
        if let Some(error) = event.error.as_deref() {
            warn!(error, "Model server reported an error in the stream");
        }

        if let Some(content) = event.content() {
            self.text.push_str(content);
            self.fragments += 1;
            trace!(fragment_len = content.len(), total_len = self.text.len(), "Appended fragment");
            (self.on_progress)(&self.text);
        }

        if event.done {
            let model = event.model.unwrap_or_default();
            if let (Some(input), Some(output)) = (event.prompt_eval_count, event.eval_count) {
                self.usage = Some(TokenUsage::new(model, input, output));
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Finish the stream; whitespace-only text is an empty extraction.
    pub fn finish(self) -> Result<StreamOutcome> {
        debug!(
            fragments = self.fragments,
            text_len = self.text.len(),
            "Stream finished"
        );
        if self.text.trim().is_empty() {
            return Err(InvoiceOcrError::EmptyExtraction);
        }
        Ok(StreamOutcome {
            text: self.text,
            usage: self.usage,
        })
    }
}

/// Drain a chunked response body, accumulating model text.
///
/// A read error ends the stream and discards the text gathered so far.
pub async fn consume_stream<S, B, E>(
    stream: S,
    on_progress: &mut ProgressCallback<'_>,
) -> Result<StreamOutcome>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<InvoiceOcrError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = NdjsonDecoder::new();
    let mut accumulator = StreamAccumulator::new(on_progress);
    let mut chunks = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Err(e.into()),
        };
        chunks += 1;
        trace!(chunk = chunks, size = chunk.as_ref().len(), "Received chunk");
        for event in decoder.push(chunk.as_ref()) {
            accumulator.apply(event);
        }
    }

    if let Some(event) = decoder.finish() {
        accumulator.apply(event);
    }

    debug!(chunks, "Response body fully consumed");
    accumulator.finish()
}
