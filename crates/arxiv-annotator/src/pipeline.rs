//! Stage orchestration over a persisted batch.
//!
//! Every stage loads the batch from the [`RecordStore`], mutates only its own
//! fields and writes the batch back in full, so any stage can be re-run on its
//! own against an earlier run's file.

use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::annotate::AnnotationEngine;
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::TextExtractor;
use crate::fetch::AssetFetcher;
use crate::models::{BatchCollection, PipelineReport, Stage, StageReport, StageStatus};
use crate::sources::{MetadataSource, SearchQuery};
use crate::store::RecordStore;

/// Runs stages against batches in one store.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    store: RecordStore,
}

impl Pipeline {
    /// Create a pipeline storing batches under `config.store_dir`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store = RecordStore::new(config.store_dir.clone());
        Self { config, store }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Backing store.
    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Query the source and persist the new batch.
    ///
    /// Nothing is written if the source fails.
    #[instrument(skip(self, source, query), fields(source = source.name()))]
    pub async fn discover(
        &self,
        source: &dyn MetadataSource,
        query: &SearchQuery,
        batch_id: &str,
    ) -> PipelineResult<PipelineReport> {
        crate::store::validate_batch_id(batch_id)?;
        if self.store.exists(batch_id) {
            warn!(batch_id, "Replacing existing batch");
        }

        let batch = source.search(query).await?;

        let mut report = StageReport::new(Stage::Discover);
        for (index, record) in batch.iter() {
            report.push(index, record.id, StageStatus::Succeeded);
        }

        self.store.save(batch_id, &batch)?;
        Ok(summarize(batch_id, &batch, vec![report]))
    }

    /// Download the assets of a stored batch.
    pub async fn fetch(&self, batch_id: &str) -> PipelineResult<PipelineReport> {
        let fetcher = AssetFetcher::new(&self.config)
            .map_err(|e| PipelineError::ClientSetup(e.to_string()))?;
        let mut batch = self.store.load(batch_id)?;

        let report = fetcher.fetch_batch(&mut batch, batch_id).await?;

        self.store.save(batch_id, &batch)?;
        Ok(summarize(batch_id, &batch, vec![report]))
    }

    /// Extract text for the downloaded documents of a stored batch.
    pub async fn extract(&self, batch_id: &str) -> PipelineResult<PipelineReport> {
        let extractor = TextExtractor::new(&self.config);
        let mut batch = self.store.load(batch_id)?;

        let report = extractor.extract_batch(&mut batch).await;

        self.store.save(batch_id, &batch)?;
        Ok(summarize(batch_id, &batch, vec![report]))
    }

    /// Annotate a stored batch with keywords and definitions.
    ///
    /// Inference settings are validated before the batch is read.
    pub async fn annotate(&self, batch_id: &str) -> PipelineResult<PipelineReport> {
        let engine = AnnotationEngine::new(&self.config)?;
        self.annotate_with(&engine, batch_id).await
    }

    /// Annotate a stored batch using an existing engine.
    pub async fn annotate_with(
        &self,
        engine: &AnnotationEngine,
        batch_id: &str,
    ) -> PipelineResult<PipelineReport> {
        let mut batch = self.store.load(batch_id)?;

        let report = engine.annotate_batch(&mut batch).await;

        self.store.save(batch_id, &batch)?;
        Ok(summarize(batch_id, &batch, vec![report]))
    }

    /// Run every stage in order for a new batch.
    ///
    /// Inference settings are checked before the first request so a missing
    /// prompt cannot waste a discovery and download run.
    #[instrument(skip(self, source, query), fields(source = source.name()))]
    pub async fn run(
        &self,
        source: &dyn MetadataSource,
        query: &SearchQuery,
        batch_id: &str,
    ) -> PipelineResult<PipelineReport> {
        let started = Instant::now();
        let engine = AnnotationEngine::new(&self.config)?;

        let mut stages = self.discover(source, query, batch_id).await?.stages;
        stages.extend(self.fetch(batch_id).await?.stages);
        stages.extend(self.extract(batch_id).await?.stages);
        stages.extend(self.annotate_with(&engine, batch_id).await?.stages);

        let batch = self.store.load(batch_id)?;
        info!(
            batch_id,
            records = batch.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Pipeline finished"
        );
        Ok(summarize(batch_id, &batch, stages))
    }

    /// Load a stored batch for inspection.
    pub fn status(&self, batch_id: &str) -> PipelineResult<BatchCollection> {
        Ok(self.store.load(batch_id)?)
    }
}

fn summarize(batch_id: &str, batch: &BatchCollection, stages: Vec<StageReport>) -> PipelineReport {
    PipelineReport {
        batch_id: batch_id.to_string(),
        records: batch.len(),
        stages,
        retired: batch.is_retired(),
    }
}
