//! Enumeration types for query and stage parameters.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Sort key accepted by the search API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Submission date.
    #[default]
    Date,
    /// Search relevance.
    Relevance,
}

impl SortBy {
    /// Accepted values, for error messages.
    pub const EXPECTED: &'static str = "date, relevance";

    /// Value of the `sortBy` query parameter.
    #[must_use]
    pub const fn api_value(self) -> &'static str {
        match self {
            Self::Date => "submittedDate",
            Self::Relevance => "relevance",
        }
    }
}

impl std::str::FromStr for SortBy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(Self::Date),
            "relevance" => Ok(Self::Relevance),
            other => Err(PipelineError::invalid_parameter("sort_by", other, Self::EXPECTED)),
        }
    }
}

/// Sort direction accepted by the search API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest or least relevant first.
    Ascending,
    /// Newest or most relevant first.
    #[default]
    Descending,
}

impl SortOrder {
    /// Accepted values, for error messages.
    pub const EXPECTED: &'static str = "ascending, descending";

    /// Value of the `sortOrder` query parameter.
    #[must_use]
    pub const fn api_value(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(Self::Ascending),
            "descending" => Ok(Self::Descending),
            other => Err(PipelineError::invalid_parameter("order", other, Self::EXPECTED)),
        }
    }
}

/// Whether a stage revisits records it has already finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReprocessPolicy {
    /// Only records the stage has not finished yet (absent or failed status).
    #[default]
    Missing,
    /// Every eligible record, overwriting earlier results.
    All,
}

impl ReprocessPolicy {
    /// Decide whether a record with the given stage status should run again.
    #[must_use]
    pub const fn should_process(self, status: Option<&super::StageStatus>) -> bool {
        match self {
            Self::All => true,
            Self::Missing => matches!(status, None | Some(super::StageStatus::Failed { .. })),
        }
    }
}

/// Pipeline stage, for reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Metadata discovery.
    Discover,
    /// Asset download.
    Fetch,
    /// Text extraction.
    Extract,
    /// Keyword and definition annotation.
    Annotate,
}

impl Stage {
    /// Human-readable stage name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Annotate => "annotate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
