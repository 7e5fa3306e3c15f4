//! Data model shared by every pipeline stage.
//!
//! Records use `#[serde(default)]` for fields filled by later stages so that a
//! batch written after discovery loads cleanly before any other stage has run.

mod batch;
mod enums;
pub(crate) mod paper;
mod report;

pub use batch::BatchCollection;
pub use enums::{ReprocessPolicy, SortBy, SortOrder, Stage};
pub use paper::{AnnotationState, PaperRecord, RecordStatus, StageStatus};
pub use report::{PipelineReport, RecordOutcome, StageReport};
