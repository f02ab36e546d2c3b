use super::models::TokenUsage;
use crate::config::GenerationSettings;
use crate::error::GenerationError;
use crate::util::truncate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sampling temperature. Fixed so runs are as repeatable as the service allows.
const TEMPERATURE: f32 = 0.0;

const ERROR_BODY_MAX_CHARS: usize = 200;

/// Text and usage from one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    pub usage: TokenUsage,
}

/// Anything that can turn a prompt into generated text.
pub trait TestGenerator {
    fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError>;
}

impl<G: TestGenerator + ?Sized> TestGenerator for &G {
    fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError> {
        (**self).generate(prompt)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Blocking Messages API client. One request per call, no retries.
pub struct AnthropicClient {
    http: reqwest::blocking::Client,
    api_key: String,
    settings: GenerationSettings,
}

impl AnthropicClient {
    pub fn new(api_key: String, settings: GenerationSettings) -> Result<Self, GenerationError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(GenerationError::Transport)?;
        Ok(Self {
            http,
            api_key,
            settings,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: TEMPERATURE,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        }
    }

    fn classify(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.settings.timeout_secs)
        } else {
            GenerationError::Transport(err)
        }
    }
}

impl TestGenerator for AnthropicClient {
    fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError> {
        tracing::info!(
            model = %self.settings.model,
            max_tokens = self.settings.max_tokens,
            "calling generation service"
        );

        let response = self
            .http
            .post(&self.settings.api_url)
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.settings.api_version)
            .json(&self.request_body(prompt))
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let text = response.text().map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: truncate(&text, ERROR_BODY_MAX_CHARS),
            });
        }

        parse_response(&text)
    }
}

/// First text block plus usage. A response without any text is an error.
pub(crate) fn parse_response(body: &str) -> Result<GenerationOutput, GenerationError> {
    let parsed: MessagesResponse = serde_json::from_str(body).map_err(GenerationError::Malformed)?;

    let text = parsed
        .content
        .into_iter()
        .find_map(|block| block.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or(GenerationError::EmptyContent)?;

    Ok(GenerationOutput {
        text,
        usage: parsed.usage,
    })
}
