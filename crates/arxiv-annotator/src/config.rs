//! Configuration for the ingestion-and-annotation pipeline.
//!
//! A single [`Config`] is built at process start and passed by reference into every
//! stage. No component reads the process environment on its own.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::ReprocessPolicy;

/// API configuration constants.
pub mod api {
    use std::time::Duration;

    /// arXiv export API query endpoint.
    pub const ARXIV_API: &str = "http://export.arxiv.org/api/query";

    /// Default local inference endpoint (Ollama generate API).
    pub const OLLAMA_API: &str = "http://localhost:11434/api/generate";

    /// Default model served by the inference endpoint.
    pub const DEFAULT_MODEL: &str = "gemma3:12b";

    /// Context window requested from the model (64k tokens).
    pub const CONTEXT_WINDOW: u32 = 65_536;

    /// Delay between consecutive asset downloads, per arXiv's API guidance.
    pub const DOWNLOAD_DELAY: Duration = Duration::from_secs(3);

    /// Transient-failure retries for a single asset download.
    pub const DOWNLOAD_RETRIES: u32 = 2;

    /// Request timeout for metadata queries and downloads.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Request timeout for a single streamed model call.
    pub const INFERENCE_TIMEOUT: Duration = Duration::from_secs(600);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Maximum keepalive connections.
    pub const MAX_KEEPALIVE: usize = 4;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);

    /// User agent sent to every upstream service.
    pub const USER_AGENT: &str = concat!("arxiv-annotator/", env!("CARGO_PKG_VERSION"));
}

/// Environment variable names read by [`Config::from_env`].
pub mod env {
    /// Inference endpoint URL.
    pub const INFERENCE_URL: &str = "OLLAMA_API";
    /// System instruction for keyword extraction.
    pub const KEYWORD_PROMPT: &str = "OLLAMA_PROMPT_KEYWORD_1";
    /// System instruction for definition generation.
    pub const DEFINITION_PROMPT: &str = "OLLAMA_PROMPT_DEFINITION_1";
    /// API key for a hosted LLM provider.
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    /// Inference backend selector (`ollama` or `openai`).
    pub const LLM_BACKEND: &str = "LLM_BACKEND";
    /// Model name override.
    pub const LLM_MODEL: &str = "LLM_MODEL";
    /// Search API override.
    pub const ARXIV_API_URL: &str = "ARXIV_API_URL";
    /// Root directory for downloaded documents.
    pub const DOWNLOAD_DIR: &str = "AURA_DOWNLOAD_DIR";
    /// Directory holding persisted batch files.
    pub const STORE_DIR: &str = "AURA_STORE_DIR";
}

/// Wire protocol spoken by the inference endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum InferenceBackendKind {
    /// Ollama `/api/generate` with newline-delimited JSON fragments.
    #[default]
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions` with server-sent events.
    Openai,
}

impl std::str::FromStr for InferenceBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::Openai),
            other => Err(ConfigError::invalid(
                env::LLM_BACKEND,
                format!("unknown backend '{other}' (expected ollama or openai)"),
            )),
        }
    }
}

/// Settings for the model endpoint used by the annotation stage.
#[derive(Clone, Default)]
pub struct InferenceConfig {
    /// Protocol of the endpoint.
    pub backend: InferenceBackendKind,

    /// Full endpoint URL.
    pub url: Option<String>,

    /// Model name sent with every request.
    pub model: String,

    /// Context window size requested from the model.
    pub context_window: u32,

    /// Bearer token for hosted providers.
    pub api_key: Option<String>,

    /// Instruction prepended to the abstract for keyword extraction.
    pub keyword_prompt: Option<String>,

    /// Instruction placed after the keyword list for definition generation.
    pub definition_prompt: Option<String>,
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("model", &self.model)
            .field("context_window", &self.context_window)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

/// Endpoint and prompts that passed validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedInference<'a> {
    /// Endpoint URL.
    pub url: &'a str,
    /// Keyword extraction instruction.
    pub keyword_prompt: &'a str,
    /// Definition generation instruction.
    pub definition_prompt: &'a str,
}

impl InferenceConfig {
    /// Check that everything the annotation stage needs is present.
    ///
    /// Runs before any network call; a missing endpoint or prompt aborts the stage.
    pub fn validate(&self) -> Result<ValidatedInference<'_>, ConfigError> {
        let url = non_empty(self.url.as_deref())
            .ok_or(ConfigError::Missing { key: env::INFERENCE_URL })?;
        let keyword_prompt = non_empty(self.keyword_prompt.as_deref())
            .ok_or(ConfigError::Missing { key: env::KEYWORD_PROMPT })?;
        let definition_prompt = non_empty(self.definition_prompt.as_deref())
            .ok_or(ConfigError::Missing { key: env::DEFINITION_PROMPT })?;

        if url::Url::parse(url).is_err() {
            return Err(ConfigError::invalid(env::INFERENCE_URL, format!("'{url}' is not a URL")));
        }
        if self.backend == InferenceBackendKind::Openai
            && non_empty(self.api_key.as_deref()).is_none()
        {
            return Err(ConfigError::Missing { key: env::LLM_API_KEY });
        }
        if self.context_window == 0 {
            return Err(ConfigError::invalid("context_window", "must be greater than zero"));
        }

        Ok(ValidatedInference { url, keyword_prompt, definition_prompt })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Search API endpoint (for testing with mock servers).
    pub arxiv_api_url: String,

    /// Root directory for per-batch document folders.
    pub download_dir: PathBuf,

    /// Directory holding `metadata_{batch}.json` files.
    pub store_dir: PathBuf,

    /// Courtesy delay between consecutive downloads.
    pub download_delay: Duration,

    /// Retries for transient download failures.
    pub download_retries: u32,

    /// Request timeout for metadata queries and downloads.
    pub request_timeout: Duration,

    /// Request timeout for one model call.
    pub inference_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Prefix of the sentinel stored in `full_text` when extraction fails.
    pub extraction_error_prefix: String,

    /// Whether stages revisit records they already finished.
    pub reprocess: ReprocessPolicy,

    /// Model endpoint settings.
    pub inference: InferenceConfig,
}

impl Config {
    /// Default extraction sentinel prefix.
    pub const EXTRACTION_ERROR_PREFIX: &'static str = "Error extracting text";

    /// Create a configuration with the default public endpoints.
    #[must_use]
    pub fn new(inference: InferenceConfig) -> Self {
        Self {
            arxiv_api_url: api::ARXIV_API.to_string(),
            download_dir: PathBuf::from("papers"),
            store_dir: PathBuf::from("metadata"),
            download_delay: api::DOWNLOAD_DELAY,
            download_retries: api::DOWNLOAD_RETRIES,
            request_timeout: api::REQUEST_TIMEOUT,
            inference_timeout: api::INFERENCE_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
            extraction_error_prefix: Self::EXTRACTION_ERROR_PREFIX.to_string(),
            reprocess: ReprocessPolicy::default(),
            inference,
        }
    }

    /// Create a test configuration with custom URLs for mock servers.
    ///
    /// The search API lives at `{base_url}/api/query` and the inference endpoint at
    /// `{base_url}/api/generate`. Files go under `work_dir`.
    #[must_use]
    pub fn for_testing(base_url: &str, work_dir: &std::path::Path) -> Self {
        Self {
            arxiv_api_url: format!("{base_url}/api/query"),
            download_dir: work_dir.join("papers"),
            store_dir: work_dir.join("metadata"),
            download_delay: Duration::ZERO, // No courtesy delay in tests
            download_retries: 0,
            request_timeout: Duration::from_secs(5),
            inference_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            extraction_error_prefix: Self::EXTRACTION_ERROR_PREFIX.to_string(),
            reprocess: ReprocessPolicy::default(),
            inference: InferenceConfig {
                backend: InferenceBackendKind::Ollama,
                url: Some(format!("{base_url}/api/generate")),
                model: api::DEFAULT_MODEL.to_string(),
                context_window: api::CONTEXT_WINDOW,
                api_key: None,
                keyword_prompt: Some(
                    "List the key topics of this abstract as a Python list: ".to_string(),
                ),
                definition_prompt: Some(
                    "Define each keyword as a Python dict using this paper: ".to_string(),
                ),
            },
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Missing prompts or endpoint are not an error here; they are reported by
    /// [`InferenceConfig::validate`] when the annotation stage starts.
    ///
    /// # Errors
    ///
    /// Returns error if a present variable holds an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let backend = match var(env::LLM_BACKEND) {
            Some(raw) => raw.parse()?,
            None => InferenceBackendKind::default(),
        };

        let inference = InferenceConfig {
            backend,
            url: var(env::INFERENCE_URL),
            model: var(env::LLM_MODEL).unwrap_or_else(|| api::DEFAULT_MODEL.to_string()),
            context_window: api::CONTEXT_WINDOW,
            api_key: var(env::LLM_API_KEY),
            keyword_prompt: var(env::KEYWORD_PROMPT),
            definition_prompt: var(env::DEFINITION_PROMPT),
        };

        let mut config = Self::new(inference);
        if let Some(url) = var(env::ARXIV_API_URL) {
            config.arxiv_api_url = url;
        }
        if let Some(dir) = var(env::DOWNLOAD_DIR) {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var(env::STORE_DIR) {
            config.store_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Validate the inference settings before the annotation stage starts.
    ///
    /// # Errors
    ///
    /// See [`InferenceConfig::validate`].
    pub fn validate_inference(&self) -> Result<ValidatedInference<'_>, ConfigError> {
        self.inference.validate()
    }

    /// Check if a hosted-provider API key is configured.
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.inference.api_key.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(InferenceConfig {
            url: Some(api::OLLAMA_API.to_string()),
            model: api::DEFAULT_MODEL.to_string(),
            context_window: api::CONTEXT_WINDOW,
            ..InferenceConfig::default()
        })
    }
}
