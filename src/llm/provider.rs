//! LLM Provider implementations

use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EndpointConfig, ProviderKind, ResolvedEndpoint};
use crate::error::{QueryError, Result};

/// Generic LLM provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &str;
    /// Deadline for a single `generate` call
    fn timeout(&self) -> Duration;
}

/// Shared plumbing for providers that talk HTTP
struct HttpEndpoint {
    client: Client,
    config: EndpointConfig,
    api_key: SecretString,
    system_prompt: String,
}

impl HttpEndpoint {
    fn new(endpoint: ResolvedEndpoint, system_prompt: &str) -> Self {
        Self {
            client: Client::new(),
            config: endpoint.config,
            api_key: endpoint.api_key,
            system_prompt: system_prompt.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url(), path)
    }

    fn key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn failure(&self, reason: impl Into<String>) -> QueryError {
        QueryError::EndpointRequest {
            endpoint: self.config.name.clone(),
            reason: reason.into(),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        tracing::debug!(endpoint = %self.config.name, model = %self.config.model, "sending request");

        let response = request
            .send()
            .await
            .map_err(|e| self.failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.failure(format!("HTTP {}: {}", status, body.trim())));
        }

        response
            .json()
            .await
            .map_err(|e| self.failure(format!("invalid response body: {}", e)))
    }

    fn require_text(&self, text: Option<String>) -> Result<String> {
        match text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(self.failure("response contained no text")),
        }
    }
}

/// OpenAI-compatible provider
pub struct OpenAiProvider {
    http: HttpEndpoint,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageResponse,
}

#[derive(Deserialize)]
struct OpenAiMessageResponse {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(endpoint: ResolvedEndpoint, system_prompt: &str) -> Self {
        Self {
            http: HttpEndpoint::new(endpoint, system_prompt),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let http = &self.http;
        let request = OpenAiRequest {
            model: &http.config.model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: &http.system_prompt,
                },
                OpenAiMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: http.config.max_tokens,
            temperature: http.config.temperature,
        };

        let response: OpenAiResponse = http
            .send(
                http.client
                    .post(http.url("chat/completions"))
                    .bearer_auth(http.key())
                    .json(&request),
            )
            .await?;

        http.require_text(
            response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content),
        )
    }

    fn name(&self) -> &str {
        &self.http.config.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.config.timeout_secs)
    }
}

/// Anthropic Claude provider
pub struct AnthropicProvider {
    http: HttpEndpoint,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(endpoint: ResolvedEndpoint, system_prompt: &str) -> Self {
        Self {
            http: HttpEndpoint::new(endpoint, system_prompt),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let http = &self.http;
        let request = AnthropicRequest {
            model: &http.config.model,
            max_tokens: http.config.max_tokens,
            temperature: http.config.temperature,
            system: &http.system_prompt,
            messages: vec![OpenAiMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response: AnthropicResponse = http
            .send(
                http.client
                    .post(http.url("messages"))
                    .header("x-api-key", http.key())
                    .header("anthropic-version", "2023-06-01")
                    .json(&request),
            )
            .await?;

        http.require_text(response.content.into_iter().find_map(|c| c.text))
    }

    fn name(&self) -> &str {
        &self.http.config.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.config.timeout_secs)
    }
}

/// Google Gemini provider
pub struct GoogleProvider {
    http: HttpEndpoint,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GoogleProvider {
    pub fn new(endpoint: ResolvedEndpoint, system_prompt: &str) -> Self {
        Self {
            http: HttpEndpoint::new(endpoint, system_prompt),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for GoogleProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let http = &self.http;
        let request = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &http.system_prompt,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: http.config.max_tokens,
                temperature: http.config.temperature,
            },
        };

        let path = format!("models/{}:generateContent", http.config.model);
        let response: GeminiResponse = http
            .send(
                http.client
                    .post(http.url(&path))
                    .header("x-goog-api-key", http.key())
                    .json(&request),
            )
            .await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            });

        http.require_text(text)
    }

    fn name(&self) -> &str {
        &self.http.config.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.config.timeout_secs)
    }
}

/// Cohere Command provider
pub struct CohereProvider {
    http: HttpEndpoint,
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    message: &'a str,
    preamble: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CohereResponse {
    text: Option<String>,
}

impl CohereProvider {
    pub fn new(endpoint: ResolvedEndpoint, system_prompt: &str) -> Self {
        Self {
            http: HttpEndpoint::new(endpoint, system_prompt),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for CohereProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let http = &self.http;
        let request = CohereRequest {
            model: &http.config.model,
            message: prompt,
            preamble: &http.system_prompt,
            max_tokens: http.config.max_tokens,
            temperature: http.config.temperature,
        };

        let response: CohereResponse = http
            .send(
                http.client
                    .post(http.url("chat"))
                    .bearer_auth(http.key())
                    .json(&request),
            )
            .await?;

        http.require_text(response.text)
    }

    fn name(&self) -> &str {
        &self.http.config.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.config.timeout_secs)
    }
}

/// Factory function to create provider from a resolved endpoint
pub fn create_provider(endpoint: ResolvedEndpoint, system_prompt: &str) -> Box<dyn LlmProvider> {
    match endpoint.config.provider {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(endpoint, system_prompt)),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(endpoint, system_prompt)),
        ProviderKind::Google => Box::new(GoogleProvider::new(endpoint, system_prompt)),
        ProviderKind::Cohere => Box::new(CohereProvider::new(endpoint, system_prompt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolved(kind: ProviderKind, model: &str, base_url: &str) -> ResolvedEndpoint {
        ResolvedEndpoint {
            config: EndpointConfig::new("Test Endpoint", kind, "TEST_KEY", model)
                .with_base_url(base_url)
                .with_timeout_secs(5),
            api_key: SecretString::from("test-key".to_string()),
        }
    }

    #[tokio::test]
    async fn test_openai_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4-turbo-preview",
                "max_tokens": 4000,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = create_provider(
            resolved(ProviderKind::OpenAi, "gpt-4-turbo-preview", &server.uri()),
            "be brief",
        );

        assert_eq!(provider.generate("hello").await.unwrap(), "hi there");
        assert_eq!(provider.name(), "Test Endpoint");
        assert_eq!(provider.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_anthropic_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({"system": "be brief"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "claude says hi"}]
            })))
            .mount(&server)
            .await;

        let provider = create_provider(
            resolved(ProviderKind::Anthropic, "claude-3-sonnet-20240229", &server.uri()),
            "be brief",
        );

        assert_eq!(provider.generate("hello").await.unwrap(), "claude says hi");
    }

    #[tokio::test]
    async fn test_gemini_generate_content_joins_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-pro:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": {"maxOutputTokens": 4000}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Gem"}, {"text": "ini"}]}}]
            })))
            .mount(&server)
            .await;

        let provider = create_provider(
            resolved(ProviderKind::Google, "gemini-pro", &server.uri()),
            "be brief",
        );

        assert_eq!(provider.generate("hello").await.unwrap(), "Gemini");
    }

    #[tokio::test]
    async fn test_cohere_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"message": "hello", "preamble": "be brief"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "cohere reply"})))
            .mount(&server)
            .await;

        let provider = create_provider(
            resolved(ProviderKind::Cohere, "command-r-plus", &server.uri()),
            "be brief",
        );

        assert_eq!(provider.generate("hello").await.unwrap(), "cohere reply");
    }

    #[tokio::test]
    async fn test_http_error_reports_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = create_provider(
            resolved(ProviderKind::OpenAi, "gpt-3.5-turbo", &server.uri()),
            "",
        );

        match provider.generate("hello").await {
            Err(QueryError::EndpointRequest { endpoint, reason }) => {
                assert_eq!(endpoint, "Test Endpoint");
                assert!(reason.contains("401"), "reason: {}", reason);
                assert!(reason.contains("invalid api key"), "reason: {}", reason);
            }
            other => panic!("expected request error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = create_provider(
            resolved(ProviderKind::OpenAi, "gpt-3.5-turbo", &server.uri()),
            "",
        );

        let err = provider.generate("hello").await.unwrap_err();
        assert!(err.to_string().contains("no text"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let provider = create_provider(
            resolved(ProviderKind::Cohere, "command-r-plus", &server.uri()),
            "",
        );

        let err = provider.generate("hello").await.unwrap_err();
        assert!(err.to_string().contains("invalid response body"));
    }
}
