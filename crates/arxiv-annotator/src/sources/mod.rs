//! Metadata sources that turn a search query into a new batch.

pub mod arxiv;
pub mod atom;

pub use arxiv::ArxivSource;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{BatchCollection, SortBy, SortOrder};

/// Largest result count the arXiv API serves in one request.
pub const MAX_RESULTS_PER_QUERY: usize = 2000;

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query text as given by the user.
    pub query: String,
    /// Sort key.
    pub sort_by: SortBy,
    /// Sort direction.
    pub order: SortOrder,
    /// Result cap.
    pub max_results: usize,
}

impl SearchQuery {
    /// Validate raw parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidQueryParameter`] for an unknown sort key or
    /// order, an empty query, or a result cap outside `1..=2000`.
    pub fn parse(
        query: &str,
        sort_by: &str,
        order: &str,
        max_results: usize,
    ) -> PipelineResult<Self> {
        let sort_by: SortBy = sort_by.parse()?;
        let order: SortOrder = order.parse()?;

        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::invalid_parameter("query", query, "a non-empty search term"));
        }
        if max_results == 0 || max_results > MAX_RESULTS_PER_QUERY {
            return Err(PipelineError::invalid_parameter(
                "max_results",
                max_results.to_string(),
                "a count between 1 and 2000",
            ));
        }

        Ok(Self { query: query.to_string(), sort_by, order, max_results })
    }

    /// Query expression sent as `search_query`.
    ///
    /// A bare term is scoped to the category field (`cat:`); a term that already
    /// names a field (`all:`, `ti:`, `cat:`, ...) is sent unchanged. Spaces go
    /// out form-encoded as `+`.
    #[must_use]
    pub fn search_expression(&self) -> String {
        if self.query.contains(':') {
            self.query.clone()
        } else {
            format!("cat:{}", self.query)
        }
    }
}

/// Common interface for metadata sources.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Source name (e.g., "arxiv").
    fn name(&self) -> &'static str;

    /// Run one query and build a batch, index-ordered as the source returned it.
    ///
    /// Either the whole batch is returned or an error; never a partial batch.
    async fn search(&self, query: &SearchQuery) -> PipelineResult<BatchCollection>;
}
