//! arXiv Annotator
//!
//! Ingests papers found by an arXiv search, downloads their PDFs, extracts the
//! full text and annotates each paper with keywords and keyword definitions
//! produced by a large language model.
//!
//! # Stages
//!
//! - **Discover**: one query against the arXiv Atom API creates a batch
//! - **Fetch**: PDFs are downloaded one at a time with a courtesy delay
//! - **Extract**: text is pulled out of each PDF, failures leave a sentinel
//! - **Annotate**: two streamed model calls per paper, keywords then definitions
//!
//! Each stage reads the batch from the [`store::RecordStore`], updates its own
//! fields and writes it back, so stages can be re-run independently.
//!
//! # Example
//!
//! ```no_run
//! use arxiv_annotator::{config::Config, pipeline::Pipeline, sources::{ArxivSource, SearchQuery}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let source = ArxivSource::new(&config)?;
//!     let query = SearchQuery::parse("cs.CL", "date", "descending", 10)?;
//!
//!     let pipeline = Pipeline::new(config);
//!     let report = pipeline.run(&source, &query, "2025-10-05").await?;
//!     println!("{}", arxiv_annotator::formatters::format_report_markdown(&report));
//!     Ok(())
//! }
//! ```

pub mod annotate;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formatters;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod store;

pub use config::Config;
pub use error::{ClientError, PipelineError, RecordError};
pub use pipeline::Pipeline;
