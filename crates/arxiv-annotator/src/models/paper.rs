//! Per-paper record carried through every pipeline stage.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One discovered paper and everything the stages have learned about it.
///
/// Discovery fills the metadata fields once; later stages only touch their own
/// fields (`local_path`, `full_text`, `keywords`, `definitions`) and their slot in
/// [`RecordStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Unique identifier assigned at discovery.
    pub id: Uuid,

    /// arXiv identifier (e.g. `2401.01234v1`), when the entry id carries one.
    #[serde(default)]
    pub arxiv_id: Option<String>,

    /// Paper title.
    pub title: String,

    /// Author names as a single display string.
    pub authors: String,

    /// Paper abstract.
    #[serde(rename = "abstract")]
    pub r#abstract: String,

    /// Publication date reported by the source.
    pub date_submitted: Option<NaiveDate>,

    /// When the record was discovered locally.
    pub date_scraped: DateTime<Utc>,

    /// Topic labels joined with ", ", absent when the source lists none.
    pub tags: Option<String>,

    /// Canonical page URL of the paper.
    pub source_url: String,

    /// Direct document URL, absent if the source does not expose one.
    pub asset_url: Option<String>,

    /// Downloaded document, absent until the fetch stage succeeds.
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// Extracted text, or the extraction sentinel.
    #[serde(default)]
    pub full_text: Option<String>,

    /// Keywords in the order the model listed them.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Keyword to definition.
    #[serde(default)]
    pub definitions: BTreeMap<String, String>,

    /// Per-stage progress markers.
    #[serde(default)]
    pub status: RecordStatus,
}

impl PaperRecord {
    /// Get the arXiv identifier, falling back to the record id.
    #[must_use]
    pub fn display_id(&self) -> String {
        self.arxiv_id.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Tag labels as a list.
    #[must_use]
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|t| t.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Full text usable for annotation: present and not an extraction sentinel.
    #[must_use]
    pub fn usable_text(&self, error_prefix: &str) -> Option<&str> {
        self.full_text
            .as_deref()
            .filter(|text| !text.starts_with(error_prefix))
    }

    /// Check whether the annotation stage produced any keywords.
    #[must_use]
    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }

    /// Check whether every stage has reached a terminal marker for this record.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status.fetch.is_some()
            && self.status.extract.is_some()
            && self.status.annotate.is_some()
    }
}

/// Terminal marker left by a stage on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage produced its output for this record.
    Succeeded,
    /// The stage had nothing to do for this record.
    Skipped {
        /// Why the record was skipped
        reason: String,
    },
    /// The stage failed for this record only.
    Failed {
        /// Diagnostic message
        reason: String,
    },
}

impl StageStatus {
    /// Create a skipped status.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped { reason: reason.into() }
    }

    /// Create a failed status.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }

    /// Check if this is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Check if this is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Reason attached to a skip or failure.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Skipped { reason } | Self::Failed { reason } => Some(reason),
        }
    }
}

/// Where a record ended up in the annotation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationState {
    /// Not yet annotated.
    Pending,
    /// Keyword prompt sent.
    KeywordsRequested,
    /// No keyword list recovered; terminal.
    KeywordsEmpty,
    /// Keyword list recovered.
    KeywordsParsed,
    /// Definition prompt sent.
    DefinitionsRequested,
    /// No definition map recovered; terminal.
    DefinitionsEmpty,
    /// Definition map recovered; terminal.
    DefinitionsParsed,
}

impl AnnotationState {
    /// Check if the state machine stops here.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::KeywordsEmpty | Self::DefinitionsEmpty | Self::DefinitionsParsed)
    }
}

/// Progress of one record through the stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
    /// Asset download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<StageStatus>,

    /// Text extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<StageStatus>,

    /// Keyword and definition annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotate: Option<StageStatus>,

    /// Last annotation state reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_state: Option<AnnotationState>,
}
