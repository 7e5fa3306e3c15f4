//! Stage tests using wiremock for the download and inference endpoints.
#![allow(clippy::needless_pass_by_value)]

mod common;

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arxiv_annotator::annotate::{AnnotationEngine, backend_for};
use arxiv_annotator::error::PipelineError;
use arxiv_annotator::extract::TextExtractor;
use arxiv_annotator::fetch::AssetFetcher;
use arxiv_annotator::models::{AnnotationState, BatchCollection, ReprocessPolicy, StageStatus};

use common::{ndjson, paper, pdf_bytes, test_config};

const KEYWORD_MARKER: &str = "List the key topics";
const DEFINITION_MARKER: &str = "Define each keyword";

// =============================================================================
// Asset Fetcher
// =============================================================================

#[tokio::test]
async fn test_fetch_failure_is_isolated() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/pdf/2401.00000v1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 first".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pdf/2401.00001v1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pdf/2401.00003v1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 fourth".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let mut batch = BatchCollection::new(vec![
        paper(0, Some(format!("{uri}/pdf/2401.00000v1"))),
        paper(1, Some(format!("{uri}/pdf/2401.00001v1"))),
        paper(2, None),
        paper(3, Some(format!("{uri}/pdf/2401.00003v1"))),
    ]);

    let fetcher = AssetFetcher::new(&config).unwrap();
    let report = fetcher.fetch_batch(&mut batch, "2025-10-05").await.unwrap();

    let first = batch.get(0).unwrap().local_path.clone().unwrap();
    assert!(first.ends_with("papers_2025-10-05/2401.00000v1.pdf"));
    assert_eq!(std::fs::read(&first).unwrap(), b"%PDF-1.4 first");

    assert!(batch.get(1).unwrap().local_path.is_none());
    assert!(batch.get(1).unwrap().status.fetch.as_ref().unwrap().is_failure());
    assert!(batch.get(2).unwrap().local_path.is_none());
    assert!(batch.get(3).unwrap().local_path.is_some());

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 1);
}

#[tokio::test]
async fn test_fetch_without_asset_makes_no_request() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut batch = BatchCollection::new(vec![paper(0, None), paper(1, None)]);
    let report = AssetFetcher::new(&config)
        .unwrap()
        .fetch_batch(&mut batch, "empty")
        .await
        .unwrap();

    assert_eq!(report.skipped(), 2);
    assert!(batch.iter().all(|(_, r)| r.local_path.is_none()));
}

#[tokio::test]
async fn test_empty_download_fails_record() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let url = format!("{}/pdf/x", mock_server.uri());
    let mut batch = BatchCollection::new(vec![paper(0, Some(url))]);
    let report = AssetFetcher::new(&config).unwrap().fetch_batch(&mut batch, "b").await.unwrap();

    assert_eq!(report.failed(), 1);
    assert!(batch.get(0).unwrap().local_path.is_none());
}

#[tokio::test]
async fn test_failed_refetch_clears_previous_path() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/pdf/2401.00001v1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 once".to_vec()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pdf/2401.00001v1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/pdf/2401.00001v1", mock_server.uri());
    let mut batch = BatchCollection::new(vec![paper(1, Some(url))]);
    let fetcher = AssetFetcher::new(&config).unwrap();
    fetcher.fetch_batch(&mut batch, "b").await.unwrap();
    assert!(batch.get(0).unwrap().local_path.is_some());

    let report = fetcher
        .with_policy(ReprocessPolicy::All)
        .fetch_batch(&mut batch, "b")
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    let record = batch.get(0).unwrap();
    assert!(record.status.fetch.as_ref().unwrap().is_failure());
    assert!(record.local_path.is_none());
}

#[tokio::test]
async fn test_unnamed_asset_url_fails_record_only() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path("/pdf/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut batch = BatchCollection::new(vec![
        paper(0, Some(format!("{}/", mock_server.uri()))),
        paper(1, Some(format!("{}/pdf/ok", mock_server.uri()))),
    ]);
    let report = AssetFetcher::new(&config).unwrap().fetch_batch(&mut batch, "b").await.unwrap();

    let reason = batch.get(0).unwrap().status.fetch.as_ref().unwrap().reason().unwrap().to_string();
    assert!(reason.contains("file name"), "{reason}");
    assert_eq!(report.succeeded(), 1);
}

// =============================================================================
// Text Extractor
// =============================================================================

#[tokio::test]
async fn test_extract_sentinel_and_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9", dir.path());

    let good = dir.path().join("good.pdf");
    std::fs::write(&good, pdf_bytes("Sparse attention")).unwrap();
    let bad = dir.path().join("bad.pdf");
    std::fs::write(&bad, b"definitely not a pdf").unwrap();

    let mut first = paper(0, None);
    first.local_path = Some(good);
    let mut second = paper(1, None);
    second.local_path = Some(bad.clone());
    let mut batch = BatchCollection::new(vec![first, second]);

    let report = TextExtractor::new(&config).extract_batch(&mut batch).await;

    assert!(batch.get(0).unwrap().full_text.as_deref().unwrap().contains("Sparse attention"));
    let sentinel = batch.get(1).unwrap().full_text.clone().unwrap();
    assert!(sentinel.starts_with(&config.extraction_error_prefix));
    assert!(bad.exists());
    assert_eq!(report.failed(), 1);
}

// =============================================================================
// Annotation Engine
// =============================================================================

fn annotated_ready(n: usize) -> arxiv_annotator::models::PaperRecord {
    let mut record = paper(n, None);
    record.full_text = Some(format!("Full text of paper {n}."));
    record
}

#[tokio::test]
async fn test_annotation_happy_path() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains(KEYWORD_MARKER))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(ndjson(
                "Here are the topics: ['nlp', 'transformers', 'evaluation'] thanks",
            )),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains(DEFINITION_MARKER))
        .and(body_string_contains("Full text of paper 0."))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(concat!(
            "Sure! {'nlp': 'natural language processing', ",
            "'transformers': 'attention based models'}"
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let engine = AnnotationEngine::new(&config).unwrap();
    let mut batch = BatchCollection::new(vec![annotated_ready(0)]);
    let report = engine.annotate_batch(&mut batch).await;

    let record = batch.get(0).unwrap();
    assert_eq!(record.keywords, vec!["nlp", "transformers", "evaluation"]);
    assert_eq!(record.definitions.len(), 2);
    assert_eq!(record.definitions["nlp"], "natural language processing");
    assert_eq!(record.status.annotation_state, Some(AnnotationState::DefinitionsParsed));
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn test_no_keywords_means_no_definition_request() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(body_string_contains(KEYWORD_MARKER))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(ndjson("I could not find any keywords.")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(DEFINITION_MARKER))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson("{}")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let engine = AnnotationEngine::new(&config).unwrap();
    let mut batch = BatchCollection::new(vec![annotated_ready(0)]);
    engine.annotate_batch(&mut batch).await;

    let record = batch.get(0).unwrap();
    assert!(record.keywords.is_empty());
    assert!(record.definitions.is_empty());
    assert_eq!(record.status.annotation_state, Some(AnnotationState::KeywordsEmpty));
}

#[tokio::test]
async fn test_malformed_definitions_do_not_stop_batch() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(body_string_contains(KEYWORD_MARKER))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson("['nlp']")))
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(DEFINITION_MARKER))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson("{'nlp': 'unbalanced")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let engine = AnnotationEngine::new(&config).unwrap();
    let mut batch = BatchCollection::new(vec![annotated_ready(0), annotated_ready(1)]);
    let report = engine.annotate_batch(&mut batch).await;

    assert_eq!(report.succeeded(), 2);
    for (_, record) in batch.iter() {
        assert_eq!(record.keywords, vec!["nlp"]);
        assert!(record.definitions.is_empty());
    }
}

#[tokio::test]
async fn test_keyword_error_status_fails_record_only() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(body_string_contains("Abstract of paper 0."))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("Abstract of paper 1."))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson("no list here")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let engine = AnnotationEngine::new(&config).unwrap();
    let mut batch = BatchCollection::new(vec![annotated_ready(0), annotated_ready(1)]);
    let report = engine.annotate_batch(&mut batch).await;

    assert!(batch.get(0).unwrap().keywords.is_empty());
    assert!(batch.get(0).unwrap().status.annotate.as_ref().unwrap().is_failure());
    assert_eq!(batch.get(1).unwrap().status.annotate, Some(StageStatus::Succeeded));
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn test_annotation_rerun_is_noop_unless_forced() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(body_string_contains(KEYWORD_MARKER))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson("['rag']")))
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(DEFINITION_MARKER))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(
            "{'rag': 'retrieval augmented generation'}",
        )))
        .expect(2)
        .mount(&mock_server)
        .await;

    let engine = AnnotationEngine::new(&config).unwrap();
    let mut batch = BatchCollection::new(vec![annotated_ready(0)]);

    engine.annotate_batch(&mut batch).await;
    let annotated = batch.clone();

    let report = engine.annotate_batch(&mut batch).await;
    assert_eq!(report.unchanged, 1);
    assert_eq!(batch, annotated);

    let forced = engine.clone().with_policy(ReprocessPolicy::All);
    let report = forced.annotate_batch(&mut batch).await;
    assert_eq!(report.succeeded(), 1);
    assert_eq!(batch.get(0).unwrap().definitions["rag"], "retrieval augmented generation");
}

#[tokio::test]
async fn test_missing_prompt_fails_before_any_call() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&mock_server.uri(), dir.path());
    config.inference.keyword_prompt = None;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    assert!(matches!(AnnotationEngine::new(&config), Err(PipelineError::Config(_))));
    assert!(backend_for(&config).is_err());

    let config_ok = test_config(&mock_server.uri(), dir.path());
    let backend = backend_for(&config_ok).unwrap();
    let engine = AnnotationEngine::with_backend(&config, Arc::clone(&backend));
    assert!(engine.is_err());
}
