//! Text extractor: turns downloaded documents into plain text.
//!
//! Parsing runs on the blocking pool so a slow or panicking parser cannot stall
//! or take down the runtime. A document that cannot be read leaves a sentinel in
//! `full_text` instead of an absent value.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::RecordError;
use crate::models::{BatchCollection, ReprocessPolicy, Stage, StageReport, StageStatus};

/// Converts one document on disk into text.
pub trait DocumentExtractor: Send + Sync {
    /// Extract the text of the document at `path`, pages in order, newline separated.
    fn extract(&self, path: &Path) -> Result<String, RecordError>;
}

/// PDF text extraction via `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, RecordError> {
        let doc = lopdf::Document::load(path).map_err(RecordError::extraction)?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(RecordError::extraction("document has no pages"));
        }

        let mut segments = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            // A page without decodable text contributes an empty segment.
            match doc.extract_text(&[*page_number]) {
                Ok(text) => segments.push(text.trim_end().to_string()),
                Err(e) => {
                    debug!(page = page_number, error = %e, "Page has no extractable text");
                    segments.push(String::new());
                }
            }
        }

        Ok(segments.join("\n"))
    }
}

/// Plain-text documents (`.txt`, `.md`), read as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, RecordError> {
        let bytes = std::fs::read(path)?;
        String::from_utf8(bytes)
            .map_err(|e| RecordError::extraction(format!("unsupported encoding: {e}")))
    }
}

/// Picks an extractor by file extension, defaulting to PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByExtension;

impl DocumentExtractor for ByExtension {
    fn extract(&self, path: &Path) -> Result<String, RecordError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("txt" | "md") => PlainTextExtractor.extract(path),
            _ => PdfExtractor.extract(path),
        }
    }
}

/// Runs a [`DocumentExtractor`] over every downloaded record of a batch.
#[derive(Clone)]
pub struct TextExtractor {
    extractor: Arc<dyn DocumentExtractor>,
    error_prefix: String,
    policy: ReprocessPolicy,
}

impl TextExtractor {
    /// Create a stage using extension-based extraction.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_extractor(config, Arc::new(ByExtension))
    }

    /// Create a stage with a custom extractor.
    #[must_use]
    pub fn with_extractor(config: &Config, extractor: Arc<dyn DocumentExtractor>) -> Self {
        Self {
            extractor,
            error_prefix: config.extraction_error_prefix.clone(),
            policy: config.reprocess,
        }
    }

    /// Sentinel stored in `full_text` for a failed extraction.
    #[must_use]
    pub fn sentinel(&self, cause: &str) -> String {
        format!("{}: {cause}", self.error_prefix)
    }

    /// Extract text for every record that has a downloaded document.
    ///
    /// Never deletes or moves source files.
    #[instrument(skip(self, batch), fields(records = batch.len()))]
    pub async fn extract_batch(&self, batch: &mut BatchCollection) -> StageReport {
        let mut report = StageReport::new(Stage::Extract);

        for (index, record) in batch.iter_mut() {
            // A skip only holds while there is still no document to read.
            let input_arrived = matches!(record.status.extract, Some(StageStatus::Skipped { .. }))
                && record.local_path.is_some();
            if !input_arrived && !self.policy.should_process(record.status.extract.as_ref()) {
                report.mark_unchanged();
                continue;
            }

            let Some(path) = record.local_path.clone() else {
                let status = StageStatus::skipped("no local document");
                record.status.extract = Some(status.clone());
                report.push(index, record.id, status);
                continue;
            };

            let status = match self.extract_one(path.clone()).await {
                Ok(text) => {
                    debug!(index, chars = text.len(), "Text extracted");
                    record.full_text = Some(text);
                    StageStatus::Succeeded
                }
                Err(e) => {
                    warn!(index, path = %path.display(), error = %e, "Text extraction failed");
                    let cause = e.to_string();
                    record.full_text = Some(self.sentinel(&cause));
                    StageStatus::failed(cause)
                }
            };
            record.status.extract = Some(status.clone());
            report.push(index, record.id, status);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            unchanged = report.unchanged,
            "Extract stage finished"
        );
        report
    }

    async fn extract_one(&self, path: std::path::PathBuf) -> Result<String, RecordError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| RecordError::extraction(format!("extractor crashed: {e}")))?
    }
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor")
            .field("error_prefix", &self.error_prefix)
            .field("policy", &self.policy)
            .finish()
    }
}
