//! Recovery of structured data from free-form model output.
//!
//! Models wrap their answer in prose ("Sure! Here are..."), so the structure is
//! located by pattern first and read second. The `recover_*` wrappers never fail:
//! unreadable output degrades to an empty value.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::literal::{LiteralError, parse_string_map};

/// First bracketed span, across newlines.
static LIST_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[(.*?)\]").expect("valid regex"));

/// Quoted items inside a list span.
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("valid regex"));

/// Braced span allowing one level of nested braces.
static MAP_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:[^{}]|(?:\{[^{}]*\}))*\}").expect("valid regex"));

/// Why model output held no usable structure.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No `[...]` span in the output.
    #[error("no list found in model output")]
    NoList,

    /// No balanced `{...}` span in the output.
    #[error("no mapping found in model output")]
    NoMapping,

    /// A mapping span was found but none could be read.
    #[error("mapping is not a valid literal: {0}")]
    Literal(#[from] LiteralError),
}

/// Extract keywords from the first bracketed list in `text`.
///
/// Items are the quoted strings inside the list, in order. A list with no
/// quoted items yields an empty vector.
///
/// # Errors
///
/// Returns [`ParseError::NoList`] when `text` contains no bracketed span.
pub fn extract_keywords(text: &str) -> Result<Vec<String>, ParseError> {
    let span = LIST_SPAN.captures(text).and_then(|c| c.get(1)).ok_or(ParseError::NoList)?;

    Ok(LIST_ITEM
        .captures_iter(span.as_str())
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Extract a keyword-to-definition map from the first braced span.
///
/// Only the first balanced span is considered; a later mapping in the same
/// response is ignored even when the first one cannot be read.
///
/// # Errors
///
/// Returns [`ParseError::NoMapping`] when no balanced span exists, or
/// [`ParseError::Literal`] when the first span is not a string mapping.
pub fn extract_definitions(text: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let span = MAP_SPAN.find(text).ok_or(ParseError::NoMapping)?;
    Ok(parse_string_map(span.as_str())?)
}

/// Keywords from `text`, or an empty list if none can be recovered.
#[must_use]
pub fn recover_keywords(text: &str) -> Vec<String> {
    extract_keywords(text).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "No keyword list recovered");
        Vec::new()
    })
}

/// Definitions from `text`, or an empty map if none can be recovered.
#[must_use]
pub fn recover_definitions(text: &str) -> BTreeMap<String, String> {
    extract_definitions(text).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "No definition mapping recovered");
        BTreeMap::new()
    })
}
