//! Shared fixtures for the mock-server tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use serde_json::json;
use uuid::Uuid;

use arxiv_annotator::config::Config;
use arxiv_annotator::models::{PaperRecord, RecordStatus};

/// Test configuration pointing every endpoint at the mock server.
pub fn test_config(server_uri: &str, work_dir: &Path) -> Config {
    Config::for_testing(server_uri, work_dir)
}

/// One Atom `<entry>`; the PDF link is omitted when `pdf_url` is `None`.
pub fn atom_entry(n: usize, pdf_url: Option<&str>) -> String {
    let pdf_link = pdf_url
        .map(|url| {
            format!(r#"<link title="pdf" href="{url}" rel="related" type="application/pdf"/>"#)
        })
        .unwrap_or_default();
    format!(
        r#"<entry>
    <id>http://arxiv.org/abs/2401.0000{n}v1</id>
    <published>2024-01-0{day}T10:00:00Z</published>
    <title>Paper number {n}</title>
    <summary>Abstract of paper {n}.</summary>
    <author><name>Author {n}</name></author>
    <link href="http://arxiv.org/abs/2401.0000{n}v1" rel="alternate" type="text/html"/>
    {pdf_link}
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>"#,
        day = n % 9 + 1
    )
}

/// A full Atom feed around the given entries.
pub fn atom_feed(entries: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">
  <title type="html">ArXiv Query</title>
  <opensearch:totalResults>{}</opensearch:totalResults>
  {}
</feed>"#,
        entries.len(),
        entries.join("\n  ")
    )
}

/// A freshly discovered record with an optional asset URL.
pub fn paper(n: usize, asset_url: Option<String>) -> PaperRecord {
    PaperRecord {
        id: Uuid::new_v4(),
        arxiv_id: Some(format!("2401.0000{n}v1")),
        title: format!("Paper number {n}"),
        authors: format!("Author {n}"),
        r#abstract: format!("Abstract of paper {n}."),
        date_submitted: None,
        date_scraped: Utc::now(),
        tags: Some("cs.CL".to_string()),
        source_url: format!("http://arxiv.org/abs/2401.0000{n}v1"),
        asset_url,
        local_path: None,
        full_text: None,
        keywords: Vec::new(),
        definitions: BTreeMap::new(),
        status: RecordStatus::default(),
    }
}

/// Ollama-style NDJSON body streaming `text` in small fragments.
pub fn ndjson(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut body = String::new();
    for chunk in chars.chunks(7) {
        let fragment: String = chunk.iter().collect();
        let line = json!({ "model": "gemma3:12b", "response": fragment, "done": false });
        body.push_str(&line.to_string());
        body.push('\n');
    }
    body.push_str(&json!({ "model": "gemma3:12b", "response": "", "done": true }).to_string());
    body.push('\n');
    body
}

/// Bytes of a one-page PDF showing `text`.
pub fn pdf_bytes(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
