//! arXiv export API adapter.
//!
//! One GET per batch against `/api/query`; the API pages server-side up to
//! `max_results`. There is no retry here: any transport error, non-2xx status or
//! unreadable feed aborts batch creation.

use std::time::Instant;

use chrono::{NaiveDate, Utc};
use reqwest::Client;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::atom::{FeedEntry, parse_feed};
use super::{MetadataSource, SearchQuery};
use crate::client::{build_client, handle_response};
use crate::config::Config;
use crate::error::{ClientError, PipelineError, PipelineResult};
use crate::models::{BatchCollection, PaperRecord, RecordStatus};

/// Client for the arXiv Atom search API.
#[derive(Clone)]
pub struct ArxivSource {
    client: Client,
    api_url: String,
}

impl ArxivSource {
    /// Create a source from the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = build_client(config, config.request_timeout)?;
        Ok(Self { client, api_url: config.arxiv_api_url.clone() })
    }

    /// Validate raw parameters and fetch a batch in one step.
    ///
    /// Invalid parameters fail before any request is sent.
    pub async fn search_raw(
        &self,
        query: &str,
        sort_by: &str,
        order: &str,
        max_results: usize,
    ) -> PipelineResult<BatchCollection> {
        let query = SearchQuery::parse(query, sort_by, order, max_results)?;
        self.search(&query).await
    }

    async fn fetch_feed(&self, query: &SearchQuery) -> Result<String, ClientError> {
        let params = [
            ("search_query", query.search_expression()),
            ("sortBy", query.sort_by.api_value().to_string()),
            ("sortOrder", query.order.api_value().to_string()),
            ("start", "0".to_string()),
            ("max_results", query.max_results.to_string()),
        ];

        let response = self.client.get(&self.api_url).query(&params).send().await?;
        let response = handle_response(response).await?;
        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl MetadataSource for ArxivSource {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    #[instrument(skip(self, query), fields(search = %query.search_expression()))]
    async fn search(&self, query: &SearchQuery) -> PipelineResult<BatchCollection> {
        let started = Instant::now();

        let body = self.fetch_feed(query).await.map_err(PipelineError::SourceUnavailable)?;
        let feed = parse_feed(&body).map_err(PipelineError::SourceUnavailable)?;

        debug!(total_results = ?feed.total_results, entries = feed.entries.len(), "Feed parsed");

        let records: Vec<PaperRecord> = feed
            .entries
            .into_iter()
            .take(query.max_results)
            .map(normalize_entry)
            .collect();

        info!(
            papers = records.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Metadata retrieved"
        );

        Ok(BatchCollection::new(records))
    }
}

impl std::fmt::Debug for ArxivSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArxivSource").field("api_url", &self.api_url).finish()
    }
}

/// Turn a feed entry into a freshly discovered record.
#[must_use]
pub fn normalize_entry(entry: FeedEntry) -> PaperRecord {
    let authors = if entry.author_names.is_empty() {
        entry.author_text.clone().unwrap_or_default()
    } else {
        entry.author_names.join(", ")
    };

    let tags = (!entry.categories.is_empty()).then(|| entry.categories.join(", "));

    let asset_url = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("related") && l.title.as_deref() == Some("pdf"))
        .map(|l| l.href.clone());

    let date_submitted = entry
        .published
        .as_deref()
        .and_then(|p| p.trim().get(..10))
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    PaperRecord {
        id: Uuid::new_v4(),
        arxiv_id: arxiv_id_from_url(&entry.id),
        title: collapse_whitespace(&entry.title),
        authors,
        r#abstract: entry.summary.trim().to_string(),
        date_submitted,
        date_scraped: Utc::now(),
        tags,
        source_url: entry.page_url().to_string(),
        asset_url,
        local_path: None,
        full_text: None,
        keywords: Vec::new(),
        definitions: std::collections::BTreeMap::new(),
        status: RecordStatus::default(),
    }
}

/// Extract the identifier from an abstract URL like `http://arxiv.org/abs/2401.01234v1`.
#[must_use]
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    let start = url.rfind("/abs/")? + "/abs/".len();
    let id = url[start..].trim_matches('/').trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
