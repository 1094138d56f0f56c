//! The field classifier oracle: spans in, field map out.

use std::future::Future;
use std::time::Duration;

use invoicer_core::fields::FieldMap;
use invoicer_core::layout::TextSpan;
use invoicer_core::oracle::{build_preamble, build_prompt, parse_field_map};
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::ollama;

use crate::error::Error;

/// Delay before the first retry; doubled on each further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Something that labels the spans of a document with invoice fields.
pub trait FieldClassifier {
    async fn classify(&self, spans: &[TextSpan]) -> Result<FieldMap, Error>;
}

/// Classifier backed by a local Ollama model through rig.
#[derive(Debug, Clone)]
pub struct OllamaClassifier {
    pub ollama_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub retries: u32,
}

fn create_client(ollama_url: &str) -> Result<ollama::Client, Error> {
    use rig::client::Nothing;

    ollama::Client::builder()
        .api_key(Nothing)
        .base_url(ollama_url)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create Ollama client: {}", e)))
}

impl OllamaClassifier {
    async fn attempt(&self, client: &ollama::Client, prompt: &str) -> Result<FieldMap, Error> {
        let agent = client
            .agent(&self.model)
            .preamble(&build_preamble())
            .build();

        let response = tokio::time::timeout(self.timeout, async { agent.prompt(prompt).await })
            .await
            .map_err(|_| Error::OracleTimeout(self.timeout.as_secs()))?
            .map_err(|e| Error::OracleTransport(e.to_string()))?;

        log::debug!("oracle answered with {} chars", response.len());
        Ok(parse_field_map(&response)?)
    }
}

impl FieldClassifier for OllamaClassifier {
    async fn classify(&self, spans: &[TextSpan]) -> Result<FieldMap, Error> {
        let prompt = build_prompt(spans)?;
        let client = create_client(&self.ollama_url)?;
        log::info!(
            "classifying {} spans with {} ({} chars)",
            spans.len(),
            self.model,
            prompt.len()
        );

        with_retries(self.retries, BASE_BACKOFF, || self.attempt(&client, &prompt)).await
    }
}

/// Run `op`, retrying retryable failures up to `retries` more times with
/// exponential backoff. The last error is returned when the budget runs out.
pub async fn with_retries<T, F, Fut>(retries: u32, backoff: Duration, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && e.is_retryable() => {
                let delay = backoff * 2u32.saturating_pow(attempt);
                log::warn!(
                    "oracle attempt {} of {} failed: {}; retrying in {:?}",
                    attempt + 1,
                    retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Deterministic classifier answering with a canned response.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct StubClassifier {
    pub response: String,
}

#[cfg(test)]
impl StubClassifier {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[cfg(test)]
impl FieldClassifier for StubClassifier {
    async fn classify(&self, _spans: &[TextSpan]) -> Result<FieldMap, Error> {
        Ok(parse_field_map(&self.response)?)
    }
}
