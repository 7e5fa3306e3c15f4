//! Integration tests against the live arXiv API.
//!
//! Run with: `cargo test --features integration -- --nocapture`
//! The annotation test additionally needs a local Ollama server and the
//! prompt variables set in the environment or `.env`.

#![cfg(feature = "integration")]

use arxiv_annotator::config::Config;
use arxiv_annotator::fetch::AssetFetcher;
use arxiv_annotator::pipeline::Pipeline;
use arxiv_annotator::sources::{ArxivSource, MetadataSource, SearchQuery};

fn live_config(work_dir: &std::path::Path) -> Config {
    let mut config = Config::from_env().unwrap();
    config.download_dir = work_dir.join("papers");
    config.store_dir = work_dir.join("metadata");
    config
}

#[tokio::test]
async fn test_live_search() {
    let dir = tempfile::tempdir().unwrap();
    let config = live_config(dir.path());
    let source = ArxivSource::new(&config).unwrap();
    let query = SearchQuery::parse("cs.CL", "date", "descending", 5).unwrap();

    let batch = source.search(&query).await.unwrap();

    assert_eq!(batch.len(), 5);
    for (_, record) in batch.iter() {
        assert!(!record.title.is_empty());
        assert!(record.arxiv_id.is_some());
        assert!(record.asset_url.is_some(), "arXiv lists a pdf link for every paper");
    }
}

#[tokio::test]
async fn test_live_fetch_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = live_config(dir.path());
    let source = ArxivSource::new(&config).unwrap();
    let query = SearchQuery::parse("cs.CL", "relevance", "descending", 1).unwrap();

    let mut batch = source.search(&query).await.unwrap();
    let report = AssetFetcher::new(&config)
        .unwrap()
        .fetch_batch(&mut batch, "live")
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    let path = batch.get(0).unwrap().local_path.clone().unwrap();
    assert!(std::fs::metadata(path).unwrap().len() > 1000);
}

#[tokio::test]
#[ignore = "needs a running inference endpoint"]
async fn test_live_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = live_config(dir.path());
    let source = ArxivSource::new(&config).unwrap();
    let query = SearchQuery::parse("cs.CL", "date", "descending", 2).unwrap();

    let report = Pipeline::new(config).run(&source, &query, "live-run").await.unwrap();
    println!("{}", arxiv_annotator::formatters::format_report_markdown(&report));
    assert_eq!(report.records, 2);
}
