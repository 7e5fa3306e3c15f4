//! Streaming text-generation backends.
//!
//! Backends:
//!   [`OllamaBackend`]  local Ollama `/api/generate`, newline-delimited JSON
//!   [`OpenAiBackend`]  OpenAI-compatible `/v1/chat/completions`, server-sent events
//!
//! Both return the concatenated fragments of one streamed completion.

use std::sync::Arc;
use std::time::Instant;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt, pin_mut};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::client::{build_client, handle_response};
use crate::config::{Config, InferenceBackendKind};
use crate::error::{ClientError, ClientResult, PipelineError, PipelineResult};

// ── Trait ─────────────────────────────────────────────────────────────────────

/// A model endpoint that turns one prompt into one completion.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logs (e.g., "ollama").
    fn name(&self) -> &'static str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Send `prompt` and return the full streamed completion.
    ///
    /// Fragments that cannot be decoded are skipped; a transport failure or
    /// non-success status is an error.
    async fn generate(&self, prompt: &str) -> ClientResult<String>;
}

/// Build the backend selected by the configuration.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if the endpoint settings are incomplete, or
/// [`PipelineError::ClientSetup`] if the HTTP client cannot be built.
pub fn backend_for(config: &Config) -> PipelineResult<Arc<dyn InferenceBackend>> {
    let validated = config.inference.validate()?;
    let client = build_client(config, config.inference_timeout)
        .map_err(|e| PipelineError::ClientSetup(e.to_string()))?;
    let model = config.inference.model.clone();

    Ok(match config.inference.backend {
        InferenceBackendKind::Ollama => Arc::new(OllamaBackend {
            client,
            url: validated.url.to_string(),
            model,
            context_window: config.inference.context_window,
        }),
        InferenceBackendKind::Openai => Arc::new(OpenAiBackend {
            client,
            url: validated.url.to_string(),
            model,
            api_key: config.inference.api_key.clone().unwrap_or_default(),
        }),
    })
}

// ── Line framing ──────────────────────────────────────────────────────────────

/// Split a byte stream into trimmed text lines.
///
/// A final line without a terminating newline is still yielded.
pub fn byte_lines<S, B>(body: S) -> impl Stream<Item = ClientResult<String>>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    try_stream! {
        pin_mut!(body);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ClientError::from)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                yield String::from_utf8_lossy(&line).trim().to_string();
            }
        }

        if !buffer.is_empty() {
            yield String::from_utf8_lossy(&buffer).trim().to_string();
        }
    }
}

fn log_completion(backend: &str, model: &str, started: Instant, text: &str) {
    info!(
        backend,
        model,
        chars = text.len(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Model call finished"
    );
}

// ── Ollama ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    url: String,
    model: String,
    context_window: u32,
}

impl OllamaBackend {
    /// Create a backend for an explicit endpoint.
    #[must_use]
    pub fn new(
        client: Client,
        url: impl Into<String>,
        model: impl Into<String>,
        context_window: u32,
    ) -> Self {
        Self { client, url: url.into(), model: model.into(), context_window }
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> ClientResult<String> {
        let started = Instant::now();
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
            options: GenerateOptions { num_ctx: self.context_window },
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let response = handle_response(response).await?;

        let lines = byte_lines(response.bytes_stream());
        pin_mut!(lines);

        let mut text = String::new();
        while let Some(line) = lines.next().await {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<GenerateChunk>(&line) {
                Ok(GenerateChunk { error: Some(message), .. }) => {
                    return Err(ClientError::Model(message));
                }
                Ok(chunk) => {
                    text.push_str(&chunk.response);
                    if chunk.done {
                        break;
                    }
                }
                Err(e) => debug!(error = %e, "Skipping undecodable stream line"),
            }
        }

        log_completion(self.name(), &self.model, started, &text);
        Ok(text)
    }
}

// ── OpenAI-compatible ─────────────────────────────────────────────────────────

/// Hosted OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    url: String,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Create a backend for an explicit endpoint.
    #[must_use]
    pub fn new(
        client: Client,
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self { client, url: url.into(), model: model.into(), api_key: api_key.into() }
    }
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InferenceBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> ClientResult<String> {
        let started = Instant::now();
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = handle_response(response).await?;

        let lines = byte_lines(response.bytes_stream());
        pin_mut!(lines);

        let mut text = String::new();
        while let Some(line) = lines.next().await {
            let line = line?;
            let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                continue;
            };
            if data == "[DONE]" {
                break;
            }
            match serde_json::from_str::<Value>(data) {
                Ok(event) => {
                    if let Some(message) = event["error"]["message"].as_str() {
                        return Err(ClientError::Model(message.to_string()));
                    }
                    if let Some(fragment) = event["choices"][0]["delta"]["content"].as_str() {
                        text.push_str(fragment);
                    }
                }
                Err(e) => debug!(error = %e, "Skipping undecodable event"),
            }
        }

        log_completion(self.name(), &self.model, started, &text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        Client::new()
    }

    #[tokio::test]
    async fn test_byte_lines_reassembles_split_chunks() {
        let chunks: Vec<Result<&[u8], reqwest::Error>> = ["{\"a\":", "1}\n{\"b\"", ":2}\n", "tail"]
            .into_iter()
            .map(|s| Ok(s.as_bytes()))
            .collect();
        let lines: Vec<String> = byte_lines(futures::stream::iter(chunks))
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"b":2}"#, "tail"]);
    }

    #[tokio::test]
    async fn test_ollama_concatenates_fragments() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"response\":\"['nlp', \",\"done\":false}\n",
            "not json at all\n",
            "{\"response\":\"'rag']\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "gemma3:12b",
                "stream": true,
                "options": { "num_ctx": 65536 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/generate", server.uri());
        let backend = OllamaBackend::new(client(), url, "gemma3:12b", 65_536);
        let text = backend.generate("prompt").await.unwrap();
        assert_eq!(text, "['nlp', 'rag']");
    }

    #[tokio::test]
    async fn test_ollama_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(client(), server.uri(), "m", 1024);
        let err = backend.generate("prompt").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_ollama_in_stream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("{\"error\":\"model not found\"}\n"),
            )
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(client(), server.uri(), "m", 1024);
        assert!(matches!(backend.generate("prompt").await, Err(ClientError::Model(_))));
    }

    #[tokio::test]
    async fn test_openai_sse() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"{'nlp': \"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"'language'}\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(
            client(),
            format!("{}/v1/chat/completions", server.uri()),
            "gpt-4o-mini",
            "sk-test",
        );
        assert_eq!(backend.generate("prompt").await.unwrap(), "{'nlp': 'language'}");
    }

    #[test]
    fn test_backend_for_requires_prompts() {
        let mut config = Config::for_testing("http://127.0.0.1:9", std::path::Path::new("/tmp/x"));
        config.inference.keyword_prompt = None;
        assert!(matches!(backend_for(&config), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_backend_for_selects_protocol() {
        let mut config = Config::for_testing("http://127.0.0.1:9", std::path::Path::new("/tmp/x"));
        assert_eq!(backend_for(&config).unwrap().name(), "ollama");

        config.inference.backend = InferenceBackendKind::Openai;
        config.inference.api_key = Some("sk-test".to_string());
        assert_eq!(backend_for(&config).unwrap().name(), "openai");
    }
}
