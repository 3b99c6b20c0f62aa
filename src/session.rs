//! End-to-end processing of uploaded invoice documents.
//!
//! An [`InvoiceSession`] takes a [`Document`] (JPEG, PNG or PDF), turns it
//! into an [`ImagePayload`], runs the extractor with retry, and keeps every
//! result in an in-memory [`History`].

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tracing::{debug, error, info, instrument};

use crate::backend::{ImagePayload, InvoiceExtractor, ProgressCallback, mime_type_for_path};
use crate::error::{InvoiceOcrError, Result};
use crate::model::{History, HistoryEntry};

const PDF_CONVERSION_FAILED: &str = "Failed to convert PDF to image";

/// Stage reached while processing a document, reported in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStep {
    PreparingFile,
    /// Only reported for PDFs.
    ConvertingFile,
    AnalyzingInvoice,
    ExtractingData,
    FormattingResults,
}

impl ProcessingStep {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStep::PreparingFile => "Preparing file",
            ProcessingStep::ConvertingFile => "Converting file",
            ProcessingStep::AnalyzingInvoice => "Analyzing invoice",
            ProcessingStep::ExtractingData => "Extracting data",
            ProcessingStep::FormattingResults => "Formatting results",
        }
    }
}

impl fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Callback receiving each processing step as it starts.
pub type StepCallback<'f> = dyn FnMut(ProcessingStep) + Send + 'f;

/// Renders the first page of a PDF as an image.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize_first_page(&self, pdf: &[u8]) -> Result<ImagePayload>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Image,
    Pdf,
}

/// An uploaded file awaiting extraction.
#[derive(Debug, Clone)]
pub struct Document {
    filename: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a document from disk, guessing the mime type from its extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(filename, mime_type_for_path(path), bytes))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn kind(&self) -> Result<DocumentKind> {
        match self.mime_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/png" => Ok(DocumentKind::Image),
            "application/pdf" => Ok(DocumentKind::Pdf),
            other => Err(InvoiceOcrError::UnsupportedDocument(format!(
                "{} ({})",
                self.filename, other
            ))),
        }
    }
}

/// Upload-to-history workflow around an [`InvoiceExtractor`].
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> invoice_ocr::Result<()> {
/// use invoice_ocr::{Document, InvoiceSession, OllamaClient};
///
/// let mut session = InvoiceSession::new(OllamaClient::from_env());
/// let document = Document::from_file("scan.png").await?;
///
/// let entry = session
///     .process(
///         document,
///         &mut |step| println!("{}...", step),
///         &mut |_: &str| {},
///     )
///     .await?;
/// println!("{}", serde_json::to_string_pretty(&entry.fields)?);
/// # Ok(())
/// # }
/// ```
pub struct InvoiceSession<E> {
    extractor: E,
    rasterizer: Option<Box<dyn Rasterizer>>,
    history: History,
}

impl<E: InvoiceExtractor> InvoiceSession<E> {
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            rasterizer: None,
            history: History::new(),
        }
    }

    /// Enable PDF uploads.
    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizer = Some(Box::new(rasterizer));
        self
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Run a document through every processing step and record the result.
    ///
    /// On failure nothing is added to the history.
    #[instrument(
        name = "invoice_session_process",
        skip(self, document, on_step, on_progress),
        fields(filename = %document.filename, mime_type = %document.mime_type)
    )]
    pub async fn process(
        &mut self,
        document: Document,
        on_step: &mut StepCallback<'_>,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<HistoryEntry> {
        on_step(ProcessingStep::PreparingFile);
        let kind = document.kind()?;
        debug!(size = document.bytes.len(), ?kind, "Prepared document");

        let payload = match kind {
            DocumentKind::Pdf => {
                on_step(ProcessingStep::ConvertingFile);
                self.convert_pdf(&document.bytes).await?
            }
            DocumentKind::Image => {
                ImagePayload::from_bytes(&document.bytes, document.mime_type.as_str())
            }
        };

        on_step(ProcessingStep::AnalyzingInvoice);
        payload.validate()?;

        on_step(ProcessingStep::ExtractingData);
        let fields = self.extractor.extract(&payload, on_progress).await?;

        on_step(ProcessingStep::FormattingResults);
        let entry = self.history.record(document.filename, fields).clone();
        info!(
            id = entry.id,
            available = entry.fields.available_count(),
            "Invoice processed"
        );
        Ok(entry)
    }

    async fn convert_pdf(&self, bytes: &[u8]) -> Result<ImagePayload> {
        let Some(rasterizer) = self.rasterizer.as_ref() else {
            error!("No rasterizer configured for PDF input");
            return Err(InvoiceOcrError::Conversion(PDF_CONVERSION_FAILED.to_string()));
        };
        rasterizer.rasterize_first_page(bytes).await.map_err(|e| {
            error!(error = %e, "PDF conversion failed");
            InvoiceOcrError::Conversion(PDF_CONVERSION_FAILED.to_string())
        })
    }

    /// Past results, newest first.
    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.history.latest()
    }

    pub fn find(&self, id: u64) -> Option<&HistoryEntry> {
        self.history.find(id)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
