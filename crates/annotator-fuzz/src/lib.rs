//! Fuzzing library for arxiv-annotator.
//!
//! This crate provides fuzzing targets for everything that reads untrusted
//! input: model output, arXiv feeds and stored batch files.
//!
//! # Usage
//!
//! ```bash
//! cd crates/annotator-fuzz
//! cargo +nightly fuzz run fuzz_definition_parse -- -max_total_time=60
//! ```

pub use arxiv_annotator::annotate;
pub use arxiv_annotator::models;
pub use arxiv_annotator::sources::atom;
