//! Asset fetcher: downloads each record's document into a per-batch directory.
//!
//! Downloads run one at a time in index order with a courtesy delay between
//! consecutive requests. A failed download only affects its own record.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, info, instrument, warn};

use crate::client::{build_download_client, handle_response};
use crate::config::Config;
use crate::error::{ClientError, PipelineResult, RecordError};
use crate::models::{BatchCollection, ReprocessPolicy, Stage, StageReport, StageStatus};

/// Downloads documents referenced by `asset_url`.
#[derive(Clone)]
pub struct AssetFetcher {
    client: ClientWithMiddleware,
    root: PathBuf,
    delay: Duration,
    policy: ReprocessPolicy,
}

impl AssetFetcher {
    /// Create a fetcher from the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_download_client(config)?,
            root: config.download_dir.clone(),
            delay: config.download_delay,
            policy: config.reprocess,
        })
    }

    /// Override the courtesy delay (zero disables it).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Override the reprocess policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReprocessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Directory holding the documents of one batch.
    #[must_use]
    pub fn batch_dir(&self, batch_id: &str) -> PathBuf {
        self.root.join(format!("papers_{batch_id}"))
    }

    /// Download every pending asset of the batch, setting `local_path` on success.
    ///
    /// Records without an `asset_url` are skipped without a request. Per-record
    /// failures are logged and reported, and clear any `local_path` left by an
    /// earlier run.
    ///
    /// # Errors
    ///
    /// Returns error only if the batch directory cannot be created.
    #[instrument(skip(self, batch), fields(records = batch.len()))]
    pub async fn fetch_batch(
        &self,
        batch: &mut BatchCollection,
        batch_id: &str,
    ) -> PipelineResult<StageReport> {
        let dir = self.batch_dir(batch_id);
        tokio::fs::create_dir_all(&dir).await?;

        let mut report = StageReport::new(Stage::Fetch);
        let mut requested = false;

        for (index, record) in batch.iter_mut() {
            if !self.policy.should_process(record.status.fetch.as_ref()) {
                report.mark_unchanged();
                continue;
            }

            let Some(url) = record.asset_url.clone() else {
                debug!(index, "No asset URL, skipping download");
                let status = StageStatus::skipped("no asset url");
                record.status.fetch = Some(status.clone());
                report.push(index, record.id, status);
                continue;
            };

            let file_name = match derive_filename(&url) {
                Ok(name) => name,
                Err(e) => {
                    warn!(index, %url, error = %e, "Cannot name downloaded file");
                    record.local_path = None;
                    let status = StageStatus::failed(e.to_string());
                    record.status.fetch = Some(status.clone());
                    report.push(index, record.id, status);
                    continue;
                }
            };

            if requested && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            requested = true;

            let status = match self.download(&url, &dir.join(&file_name)).await {
                Ok(path) => {
                    debug!(index, path = %path.display(), "Asset downloaded");
                    record.local_path = Some(path);
                    StageStatus::Succeeded
                }
                Err(e) => {
                    warn!(index, %url, error = %e, "Asset download failed");
                    record.local_path = None;
                    StageStatus::failed(e.to_string())
                }
            };
            record.status.fetch = Some(status.clone());
            report.push(index, record.id, status);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            unchanged = report.unchanged,
            dir = %dir.display(),
            "Fetch stage finished"
        );
        Ok(report)
    }

    /// Download a single document into `dir`, naming it `file_name` or a name
    /// derived from the URL.
    pub async fn fetch_one(
        &self,
        url: &str,
        dir: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf, RecordError> {
        let name = match file_name {
            Some(name) => name.to_string(),
            None => derive_filename(url)?,
        };
        tokio::fs::create_dir_all(dir).await?;
        self.download(url, &dir.join(name)).await
    }

    async fn download(&self, url: &str, target: &Path) -> Result<PathBuf, RecordError> {
        let response = self.client.get(url).send().await.map_err(ClientError::from)?;
        let response = handle_response(response).await?;
        let bytes = response.bytes().await.map_err(ClientError::from)?;

        if bytes.is_empty() {
            return Err(RecordError::EmptyAsset { url: url.to_string() });
        }

        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || persist_bytes(&bytes, &target).map(|()| target))
            .await
            .map_err(std::io::Error::other)?
            .map_err(RecordError::from)
    }
}

impl std::fmt::Debug for AssetFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetFetcher")
            .field("root", &self.root)
            .field("delay", &self.delay)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Write `bytes` to `target` through a temporary file in the same directory.
///
/// A half-written file never appears under the final name, and the temporary
/// file is removed if any step fails.
fn persist_bytes(bytes: &[u8], target: &Path) -> std::io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Derive a local file name from the identifier segment of a document URL.
///
/// `http://arxiv.org/pdf/2401.01234v1` becomes `2401.01234v1.pdf`.
///
/// # Errors
///
/// Returns [`RecordError::FilenameDerivation`] if the URL does not parse or its
/// path has no usable last segment.
pub fn derive_filename(url: &str) -> Result<String, RecordError> {
    let parsed = url::Url::parse(url).map_err(|_| RecordError::filename(url))?;

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .filter(|s| *s != "." && *s != "..")
        .ok_or_else(|| RecordError::filename(url))?;

    if segment.to_ascii_lowercase().ends_with(".pdf") {
        Ok(segment.to_string())
    } else {
        Ok(format!("{segment}.pdf"))
    }
}
