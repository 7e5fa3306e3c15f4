//! Markdown output formatting.

use std::borrow::Cow;

use crate::models::{BatchCollection, PaperRecord, PipelineReport, StageReport, StageStatus};

/// Format a pipeline report as a per-stage summary table plus failures.
#[must_use]
pub fn format_report_markdown(report: &PipelineReport) -> String {
    let mut output = format!("# Batch {} ({} records)\n\n", report.batch_id, report.records);

    if report.stages.is_empty() {
        output.push_str("No stages ran.\n");
        return output;
    }

    output.push_str("| Stage | Succeeded | Failed | Skipped | Unchanged |\n");
    output.push_str("|-------|-----------|--------|---------|-----------|\n");
    for stage in &report.stages {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            stage.stage,
            stage.succeeded(),
            stage.failed(),
            stage.skipped(),
            stage.unchanged
        ));
    }
    output.push('\n');

    for stage in &report.stages {
        output.push_str(&format_failures_markdown(stage));
    }

    if report.retired {
        output.push_str("**Retired**: every record has reached a final state.\n");
    }

    output
}

fn format_failures_markdown(stage: &StageReport) -> String {
    let mut output = String::new();
    let mut failures = stage.failures().peekable();
    if failures.peek().is_none() {
        return output;
    }

    output.push_str(&format!("## {} failures\n\n", stage.stage));
    for failure in failures {
        output.push_str(&format!(
            "- #{}: {}\n",
            failure.index,
            failure.status.reason().unwrap_or("unknown")
        ));
    }
    output.push('\n');
    output
}

/// Format every record of a batch with its stage progress.
#[must_use]
pub fn format_batch_markdown(batch_id: &str, batch: &BatchCollection) -> String {
    if batch.is_empty() {
        return format!("Batch {batch_id} has no records.");
    }

    let mut output = format!("# Batch {batch_id} ({} records)\n\n", batch.len());

    for (index, record) in batch.iter() {
        output.push_str(&format_record_markdown(record, index));
        output.push_str("\n---\n\n");
    }

    output
}

/// Format a single record as Markdown.
#[must_use]
pub fn format_record_markdown(record: &PaperRecord, index: usize) -> String {
    let mut output = String::new();

    output.push_str(&format!("## {}. {}\n\n", index, record.title));

    if !record.authors.is_empty() {
        output.push_str(&format!("**Authors**: {}\n\n", record.authors));
    }

    let mut meta = Vec::new();
    meta.push(format!("**arXiv**: [{}]({})", record.display_id(), record.source_url));
    if let Some(date) = record.date_submitted {
        meta.push(format!("**Submitted**: {date}"));
    }
    if let Some(tags) = &record.tags {
        meta.push(format!("**Tags**: {tags}"));
    }
    output.push_str(&format!("{}\n\n", meta.join(" | ")));

    // Stage progress
    let stages = [
        ("Fetch", record.status.fetch.as_ref()),
        ("Extract", record.status.extract.as_ref()),
        ("Annotate", record.status.annotate.as_ref()),
    ];
    let progress: Vec<String> = stages
        .iter()
        .map(|(label, status)| format!("{label}: {}", status_label(*status)))
        .collect();
    output.push_str(&format!("**Progress**: {}\n\n", progress.join(" | ")));

    if let Some(path) = &record.local_path {
        output.push_str(&format!("**File**: `{}`\n\n", path.display()));
    }

    if record.has_keywords() {
        output.push_str(&format!(
            "**Keywords** ({}): {}\n\n",
            record.keywords.len(),
            record.keywords.join(", ")
        ));
    }

    if !record.definitions.is_empty() {
        output.push_str(&format!("**Definitions** ({}):\n\n", record.definitions.len()));
        for (keyword, definition) in &record.definitions {
            output.push_str(&format!("- **{keyword}**: {}\n", truncate(definition, 200)));
        }
        output.push('\n');
    }

    output.push_str(&format!("**Abstract**: {}\n", truncate(&record.r#abstract, 300)));

    output
}

fn status_label(status: Option<&StageStatus>) -> Cow<'static, str> {
    match status {
        None => Cow::Borrowed("pending"),
        Some(StageStatus::Succeeded) => Cow::Borrowed("done"),
        Some(StageStatus::Skipped { reason }) => Cow::Owned(format!("skipped ({reason})")),
        Some(StageStatus::Failed { reason }) => Cow::Owned(format!("failed ({reason})")),
    }
}

fn truncate(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}
