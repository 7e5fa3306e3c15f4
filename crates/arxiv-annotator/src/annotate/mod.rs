//! Annotation engine: LLM keyword extraction and definition generation.
//!
//! - [`inference`]: streaming model backends
//! - [`parse`]: recovery of lists and mappings from free-form output
//! - [`literal`]: the literal grammar the mappings are read with
//! - [`engine`]: the per-record state machine

pub mod engine;
pub mod inference;
pub mod literal;
pub mod parse;

pub use engine::AnnotationEngine;
pub use inference::{InferenceBackend, OllamaBackend, OpenAiBackend, backend_for};
pub use parse::{
    ParseError, extract_definitions, extract_keywords, recover_definitions, recover_keywords,
};
