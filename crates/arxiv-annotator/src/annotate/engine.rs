//! Keyword and definition annotation of a batch.
//!
//! Per record:
//! `PENDING → KEYWORDS_REQUESTED → {KEYWORDS_EMPTY | KEYWORDS_PARSED}`, then
//! `KEYWORDS_PARSED → DEFINITIONS_REQUESTED → {DEFINITIONS_EMPTY | DEFINITIONS_PARSED}`.
//! The definition call is only made when keywords were recovered.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::inference::{InferenceBackend, backend_for};
use super::literal::format_string_list;
use super::parse::{recover_definitions, recover_keywords};
use crate::config::Config;
use crate::error::{PipelineResult, RecordError};
use crate::models::{
    AnnotationState, BatchCollection, PaperRecord, ReprocessPolicy, Stage, StageReport, StageStatus,
};

/// Drives the two model calls per record and stores what can be recovered.
#[derive(Clone)]
pub struct AnnotationEngine {
    backend: Arc<dyn InferenceBackend>,
    keyword_prompt: String,
    definition_prompt: String,
    error_prefix: String,
    policy: ReprocessPolicy,
}

impl AnnotationEngine {
    /// Create an engine using the backend selected by the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint or either prompt is missing;
    /// no request is made in that case.
    pub fn new(config: &Config) -> PipelineResult<Self> {
        let backend = backend_for(config)?;
        Self::with_backend(config, backend)
    }

    /// Create an engine around an existing backend.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either prompt is missing.
    pub fn with_backend(
        config: &Config,
        backend: Arc<dyn InferenceBackend>,
    ) -> PipelineResult<Self> {
        let validated = config.validate_inference()?;
        Ok(Self {
            backend,
            keyword_prompt: validated.keyword_prompt.to_string(),
            definition_prompt: validated.definition_prompt.to_string(),
            error_prefix: config.extraction_error_prefix.clone(),
            policy: config.reprocess,
        })
    }

    /// Override the reprocess policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReprocessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Prompt for keyword extraction: instruction followed by the abstract.
    #[must_use]
    pub fn keyword_prompt(&self, record: &PaperRecord) -> String {
        format!("{}{}", self.keyword_prompt, record.r#abstract)
    }

    /// Prompt for definitions: keyword list, instruction, then the full text.
    #[must_use]
    pub fn definition_prompt(&self, keywords: &[String], full_text: &str) -> String {
        format!("{}: {}{}", format_string_list(keywords), self.definition_prompt, full_text)
    }

    /// Annotate every pending record of the batch in index order.
    #[instrument(skip(self, batch), fields(records = batch.len(), backend = self.backend.name()))]
    pub async fn annotate_batch(&self, batch: &mut BatchCollection) -> StageReport {
        let mut report = StageReport::new(Stage::Annotate);

        for (index, record) in batch.iter_mut() {
            // A skip only holds while there is still no usable text.
            let input_arrived = matches!(record.status.annotate, Some(StageStatus::Skipped { .. }))
                && record.usable_text(&self.error_prefix).is_some();
            if !input_arrived && !self.policy.should_process(record.status.annotate.as_ref()) {
                report.mark_unchanged();
                continue;
            }

            let status = self.annotate_record(record).await;
            if let Some(reason) = status.reason().filter(|_| status.is_failure()) {
                warn!(index, paper = %record.display_id(), reason, "Annotation failed");
            }
            record.status.annotate = Some(status.clone());
            report.push(index, record.id, status);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            unchanged = report.unchanged,
            "Annotate stage finished"
        );
        report
    }

    /// Run the annotation state machine for one record.
    ///
    /// Keywords and definitions are written to the record before returning, even
    /// when the definition call fails. Model output that cannot be read yields
    /// empty values, never an error.
    pub async fn annotate_record(&self, record: &mut PaperRecord) -> StageStatus {
        let Some(full_text) = record.usable_text(&self.error_prefix).map(str::to_owned) else {
            return StageStatus::skipped("no usable full text");
        };

        record.keywords.clear();
        record.definitions.clear();

        record.status.annotation_state = Some(AnnotationState::KeywordsRequested);
        let response = match self.backend.generate(&self.keyword_prompt(record)).await {
            Ok(response) => response,
            Err(e) => return StageStatus::failed(RecordError::Inference(e).to_string()),
        };

        let keywords = recover_keywords(&response);
        if keywords.is_empty() {
            info!(paper = %record.display_id(), "No keywords found");
            record.status.annotation_state = Some(AnnotationState::KeywordsEmpty);
            return StageStatus::Succeeded;
        }
        debug!(paper = %record.display_id(), count = keywords.len(), "Keywords parsed");
        record.keywords = keywords;
        record.status.annotation_state = Some(AnnotationState::KeywordsParsed);

        let prompt = self.definition_prompt(&record.keywords, &full_text);
        record.status.annotation_state = Some(AnnotationState::DefinitionsRequested);
        let response = match self.backend.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => return StageStatus::failed(RecordError::Inference(e).to_string()),
        };

        let mut definitions = recover_definitions(&response);
        let recovered = definitions.len();
        definitions.retain(|keyword, _| record.keywords.contains(keyword));
        if definitions.len() < recovered {
            debug!(
                dropped = recovered - definitions.len(),
                "Dropped definitions for unknown keywords"
            );
        }

        record.status.annotation_state = Some(if definitions.is_empty() {
            AnnotationState::DefinitionsEmpty
        } else {
            AnnotationState::DefinitionsParsed
        });
        record.definitions = definitions;
        StageStatus::Succeeded
    }
}

impl std::fmt::Debug for AnnotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationEngine")
            .field("backend", &self.backend.name())
            .field("model", &self.backend.model())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
