//! Error types for the ingestion-and-annotation pipeline.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Errors are layered: [`ClientError`] covers a single HTTP exchange, [`RecordError`]
//! covers one record inside a stage and never leaves it, and [`PipelineError`] is the
//! batch-level failure surfaced to the caller.

use std::path::PathBuf;
use std::time::Duration;

/// Errors from the HTTP client layer.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error (retry layer on the download client)
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Rate limited by the upstream service (429 response)
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested wait time before retry
        retry_after: Duration,
    },

    /// Resource not found (404 response)
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Invalid request parameters (400 response)
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message from the upstream service
        message: String,
    },

    /// Server error (5xx response)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// The search API answered with a document that is not a readable Atom feed
    #[error("Malformed feed: {0}")]
    Feed(String),

    /// The model endpoint reported an error inside a streamed response
    #[error("Model error: {0}")]
    Model(String),
}

impl ClientError {
    /// Create a rate limited error with retry-after duration.
    #[must_use]
    pub fn rate_limited(seconds: u64) -> Self {
        Self::RateLimited { retry_after: Duration::from_secs(seconds) }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// Create a server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Create a malformed feed error.
    #[must_use]
    pub fn feed(message: impl Into<String>) -> Self {
        Self::Feed(message.into())
    }

    /// Returns true if the underlying transport gave up waiting.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout(),
            Self::Middleware(reqwest_middleware::Error::Reqwest(e)) => e.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status carried by this error, if the server answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::NotFound { .. } => Some(404),
            Self::BadRequest { .. } => Some(400),
            Self::Server { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Missing or invalid configuration, detected before any network call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    #[error("Missing required configuration: {key}")]
    Missing {
        /// Environment variable or flag name
        key: &'static str,
    },

    /// A setting is present but unusable.
    #[error("Invalid configuration for {key}: {message}")]
    Invalid {
        /// Environment variable or flag name
        key: &'static str,
        /// Why the value was rejected
        message: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { key, message: message.into() }
    }
}

/// Failures of the persisted batch file.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No batch file exists for the requested identifier.
    #[error("No stored batch at {}", path.display())]
    NotFound {
        /// Expected location of the batch file
        path: PathBuf,
    },

    /// Filesystem failure while reading or writing the batch file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The batch file exists but does not hold a valid collection.
    #[error("Corrupt batch file {}: {source}", path.display())]
    Corrupt {
        /// File being read
        path: PathBuf,
        /// Decoding error
        #[source]
        source: serde_json::Error,
    },

    /// The collection could not be encoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The batch identifier cannot be turned into a file name.
    #[error("Invalid batch id '{0}'")]
    InvalidBatchId(String),
}

/// A failure confined to a single record within one stage.
///
/// Stages convert these into a [`crate::models::RecordOutcome`] and a persisted
/// [`crate::models::StageStatus`]; they never abort the batch.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// Asset download failed (timeout, 4xx/5xx, broken body).
    #[error("Download failed: {0}")]
    Download(#[from] ClientError),

    /// The download endpoint answered with an empty body.
    #[error("Empty document from '{url}'")]
    EmptyAsset {
        /// Requested URL
        url: String,
    },

    /// No output name could be derived from the asset URL.
    #[error("Cannot derive a file name from '{url}'")]
    FilenameDerivation {
        /// Offending URL
        url: String,
    },

    /// The document could not be turned into text.
    #[error("{0}")]
    Extraction(String),

    /// The inference endpoint failed for this record.
    #[error("Inference failed: {0}")]
    Inference(ClientError),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordError {
    /// Create a filename derivation error.
    #[must_use]
    pub fn filename(url: impl Into<String>) -> Self {
        Self::FilenameDerivation { url: url.into() }
    }

    /// Create an extraction error.
    #[must_use]
    pub fn extraction(cause: impl std::fmt::Display) -> Self {
        Self::Extraction(cause.to_string())
    }
}

/// Batch-level errors returned to the caller of a stage.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A query parameter is outside its allowed set; raised before any network call.
    #[error("Invalid value '{value}' for {parameter}. Valid options: {expected}")]
    InvalidQueryParameter {
        /// Parameter name (sort_by, order, max_results)
        parameter: &'static str,
        /// Rejected value
        value: String,
        /// Human-readable list of accepted values
        expected: &'static str,
    },

    /// The metadata source could not be reached or rejected the query.
    #[error("Metadata source unavailable: {0}")]
    SourceUnavailable(#[source] ClientError),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The batch file could not be read or written.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP client construction failed.
    #[error("Client setup failed: {0}")]
    ClientSetup(String),

    /// Local filesystem failure outside any single record.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create an invalid query parameter error.
    #[must_use]
    pub fn invalid_parameter(
        parameter: &'static str,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::InvalidQueryParameter { parameter, value: value.into(), expected }
    }

    /// Convert to a user-friendly message for the CLI.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::SourceUnavailable(ClientError::RateLimited { retry_after }) => {
                format!(
                    "The search API is rate limiting requests. \
                     Please wait {retry_after:?} before retrying."
                )
            }
            Self::Store(StoreError::NotFound { path }) => {
                format!("No batch found at {}. Run `scrape` first.", path.display())
            }
            Self::Config(ConfigError::Missing { key }) => {
                format!("Set {key} in the environment or .env file.")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for batch-level operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
