//! Per-record outcomes and batch-level summaries returned by each stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Stage, StageStatus};

/// Result of one stage for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Batch index.
    pub index: usize,

    /// Record identifier.
    pub paper_id: Uuid,

    /// Success/failure tag with diagnostic payload.
    pub status: StageStatus,
}

/// Outcomes of one stage over a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage that produced the outcomes.
    pub stage: Stage,

    /// One entry per record the stage looked at, in index order.
    pub outcomes: Vec<RecordOutcome>,

    /// Records left untouched because they were already done.
    #[serde(default)]
    pub unchanged: usize,
}

impl StageReport {
    /// Create an empty report for a stage.
    #[must_use]
    pub fn new(stage: Stage) -> Self {
        Self { stage, outcomes: Vec::new(), unchanged: 0 }
    }

    /// Record the outcome for one record.
    pub fn push(&mut self, index: usize, paper_id: Uuid, status: StageStatus) {
        self.outcomes.push(RecordOutcome { index, paper_id, status });
    }

    /// Note a record skipped because an earlier run finished it.
    pub fn mark_unchanged(&mut self) {
        self.unchanged += 1;
    }

    /// Number of records that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    /// Number of records that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_failure()).count()
    }

    /// Number of records with nothing to do.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, StageStatus::Skipped { .. }))
            .count()
    }

    /// Failed outcomes, for diagnostics.
    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    /// Outcome for a given batch index.
    #[must_use]
    pub fn outcome(&self, index: usize) -> Option<&RecordOutcome> {
        self.outcomes.iter().find(|o| o.index == index)
    }
}

/// Reports of every stage that ran against one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Batch identifier.
    pub batch_id: String,

    /// Number of records in the batch.
    pub records: usize,

    /// Stage reports in execution order.
    pub stages: Vec<StageReport>,

    /// Whether the batch needs no further runs.
    pub retired: bool,
}

impl PipelineReport {
    /// Report of a given stage, if it ran.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}
