//! JSON output formatting.

use serde_json::{Value, json};

use crate::models::{BatchCollection, PaperRecord, PipelineReport};

/// Create a compact record representation for status output.
///
/// Omits the full text and abstract, which dominate the stored file.
#[must_use]
pub fn compact_record(record: &PaperRecord, index: usize) -> Value {
    let mut obj = json!({
        "index": index,
        "id": record.id,
        "title": record.title,
        "keywords": record.keywords.len(),
        "definitions": record.definitions.len(),
        "status": record.status,
    });

    if let Some(arxiv) = &record.arxiv_id {
        obj["arxiv"] = json!(arxiv);
    }

    if let Some(path) = &record.local_path {
        obj["file"] = json!(path);
    }

    if let Some(date) = record.date_submitted {
        obj["submitted"] = json!(date);
    }

    obj
}

/// Compact view of every record of a batch.
#[must_use]
pub fn batch_status_json(batch_id: &str, batch: &BatchCollection) -> Value {
    json!({
        "batch_id": batch_id,
        "records": batch.len(),
        "retired": batch.is_retired(),
        "papers": batch.iter().map(|(i, r)| compact_record(r, i)).collect::<Vec<_>>(),
    })
}

/// Stage counts of a report, with failure reasons.
#[must_use]
pub fn report_json(report: &PipelineReport) -> Value {
    let stages: Vec<Value> = report
        .stages
        .iter()
        .map(|stage| {
            json!({
                "stage": stage.stage,
                "succeeded": stage.succeeded(),
                "failed": stage.failed(),
                "skipped": stage.skipped(),
                "unchanged": stage.unchanged,
                "failures": stage
                    .failures()
                    .map(|f| json!({ "index": f.index, "reason": f.status.reason() }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "batch_id": report.batch_id,
        "records": report.records,
        "retired": report.retired,
        "stages": stages,
    })
}
