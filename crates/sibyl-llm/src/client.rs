//! Perplexity chat-completions client.
//!
//! Builds and sends non-streaming requests to the Perplexity API, which
//! speaks the OpenAI chat-completions shape. One call in, one text answer
//! out; every failure maps onto [`AnswerError`], and transient ones are
//! retried per the configured [`RetryPolicy`] before surfacing.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::error::{AnswerError, AnswerResult};
use crate::model::SonarModel;
use crate::retry::RetryPolicy;

/// Default base URL for the Perplexity API.
const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One answer request: a prompt, an optional system message, and a model.
#[derive(Clone, Debug, Default)]
pub struct AnswerRequest {
    /// Model to query.
    pub model: SonarModel,
    /// Optional system message sent ahead of the prompt.
    pub system: Option<String>,
    /// The user prompt.
    pub prompt: String,
}

/// The seam between the protocol core and the upstream API.
///
/// Implementors must be `Send + Sync`; tests substitute this trait for the
/// real HTTP client.
#[async_trait]
pub trait AnswerClient: Send + Sync {
    /// Forward one request upstream and return the answer text.
    async fn answer(&self, request: &AnswerRequest) -> AnswerResult<String>;
}

/// Configuration for [`PerplexityClient`].
#[derive(Clone, Debug)]
pub struct PerplexityConfig {
    /// Upstream API credential (bearer token).
    pub api_key: String,
    /// Base URL override; `None` means the production endpoint.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry behavior for transient failures.
    pub retry: RetryPolicy,
}

impl PerplexityConfig {
    /// Config with the default endpoint, timeout, and retry policy.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Production [`AnswerClient`] over the Perplexity HTTP API.
pub struct PerplexityClient {
    /// Configuration.
    config: PerplexityConfig,
    /// HTTP client.
    client: reqwest::Client,
}

impl PerplexityClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: PerplexityConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: PerplexityConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Build HTTP headers for the request.
    fn build_headers(&self) -> AnswerResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = format!("Bearer {}", self.config.api_key);
        let _ = headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AnswerError::Auth {
                message: format!("Invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    /// One attempt: build, send, and decode a single chat-completions call.
    async fn try_answer(&self, request: &AnswerRequest) -> AnswerResult<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: request.model.as_str(),
            messages,
        };
        let base_url = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{base_url}/chat/completions");
        let headers = self.build_headers()?;

        debug!(
            prompt_len = request.prompt.len(),
            has_system = request.system.is_some(),
            "sending chat-completions request"
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(AnswerError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_secs);
            let body_text = response.text().await.unwrap_or_default();
            let message = parse_api_error(&body_text, status.as_u16());
            error!(status = status.as_u16(), message = %message, "upstream API error");
            return Err(match status.as_u16() {
                401 | 403 => AnswerError::Auth { message },
                429 => AnswerError::RateLimited {
                    retry_after_ms: retry_after_ms.unwrap_or(0),
                    message,
                },
                s => AnswerError::Api {
                    status: s,
                    message,
                    retryable: s >= 500,
                },
            });
        }

        let body_text = response.text().await.map_err(AnswerError::Http)?;
        let completion: ChatResponse = serde_json::from_str(&body_text)?;
        extract_content(completion)
    }
}

/// Chat-completions request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

/// One message in the request body.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat-completions response body (only the fields we read).
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl AnswerClient for PerplexityClient {
    /// Send the request, retrying transient failures with exponential
    /// backoff. Non-retryable errors and an exhausted budget surface the
    /// last error unchanged.
    #[instrument(skip_all, fields(model = %request.model))]
    async fn answer(&self, request: &AnswerRequest) -> AnswerResult<String> {
        let mut attempt = 0_u32;
        loop {
            match self.try_answer(request).await {
                Ok(answer) => return Ok(answer),
                Err(err) if err.is_retryable() && attempt < self.config.retry.max_retries => {
                    let delay_ms = self
                        .config
                        .retry
                        .delay_ms_for(attempt, err.retry_after_ms());
                    attempt += 1;
                    warn!(
                        category = err.category(),
                        attempt,
                        max_retries = self.config.retry.max_retries,
                        delay_ms,
                        "retrying upstream request"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Pull the first choice's text out of a completion.
fn extract_content(completion: ChatResponse) -> AnswerResult<String> {
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    if content.is_empty() {
        return Err(AnswerError::EmptyCompletion);
    }
    Ok(content)
}

/// Parse an API error response body into a message.
fn parse_api_error(body: &str, status: u16) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            return message.to_owned();
        }
    }
    format!("HTTP {status}: {body}")
}

/// Parse a `retry-after` header value (delay-seconds form) to milliseconds.
fn parse_retry_after_secs(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // Mapping tests pin retries off so each asserts on exactly one request.
    fn test_client(server_uri: &str) -> PerplexityClient {
        PerplexityClient::new(PerplexityConfig {
            api_key: "test-key".into(),
            base_url: Some(server_uri.to_owned()),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::none(),
        })
    }

    fn retrying_client(server_uri: &str, max_retries: u32) -> PerplexityClient {
        PerplexityClient::new(PerplexityConfig {
            api_key: "test-key".into(),
            base_url: Some(server_uri.to_owned()),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries,
                base_delay_ms: 1,
                max_delay_ms: 10,
            },
        })
    }

    fn completion_body(text: &str) -> serde_json::Value {
        json!({
            "id": "cmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })
    }

    // ── Request shape ────────────────────────────────────────────────

    #[tokio::test]
    async fn answer_posts_openai_shape_with_bearer_auth() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .and(wiremock::matchers::header("authorization", "Bearer test-key"))
            .and(wiremock::matchers::body_partial_json(json!({
                "model": "sonar-pro",
                "messages": [{"role": "user", "content": "what is rust"}]
            })))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(completion_body("a language")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let answer = client
            .answer(&AnswerRequest {
                model: SonarModel::SonarPro,
                system: None,
                prompt: "what is rust".into(),
            })
            .await
            .unwrap();
        assert_eq!(answer, "a language");
    }

    #[tokio::test]
    async fn system_message_precedes_prompt() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::body_partial_json(json!({
                "model": "sonar-reasoning-pro",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(completion_body("ok")),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let answer = client
            .answer(&AnswerRequest {
                model: SonarModel::SonarReasoningPro,
                system: Some("be brief".into()),
                prompt: "hi".into(),
            })
            .await
            .unwrap();
        assert_eq!(answer, "ok");
    }

    // ── Error mapping ────────────────────────────────────────────────

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "invalid api key"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::Auth { ref message } if message == "invalid api key");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn rate_limit_maps_retry_after_header() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_string("too many requests"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::RateLimited { retry_after_ms: 3000, .. });
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_retryable_api_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::Api { status: 503, retryable: true, .. });
    }

    #[tokio::test]
    async fn client_error_message_parsed_from_json_body() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "unknown model"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(
            err,
            AnswerError::Api { status: 400, ref message, retryable: false } if message == "unknown model"
        );
    }

    // ── Retry behavior ───────────────────────────────────────────────

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(completion_body("recovered")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = retrying_client(&server.uri(), 3);
        let answer = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(answer, "recovered");
    }

    #[tokio::test]
    async fn exhausted_retry_budget_returns_the_last_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(3)
            .mount(&server)
            .await;

        // Two retries after the first try: exactly three requests.
        let client = retrying_client(&server.uri(), 2);
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::Api { status: 502, retryable: true, .. });
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_string("no"))
            .expect(1)
            .mount(&server)
            .await;

        let client = retrying_client(&server.uri(), 3);
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::Auth { .. });
    }

    // ── Completion extraction ────────────────────────────────────────

    #[tokio::test]
    async fn empty_choices_is_empty_completion() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "cmpl-2", "choices": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::EmptyCompletion);
    }

    #[tokio::test]
    async fn null_content_is_empty_completion() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::EmptyCompletion);
    }

    #[tokio::test]
    async fn malformed_success_body_is_json_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .answer(&AnswerRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::Json(_));
    }

    // ── Helpers ──────────────────────────────────────────────────────

    #[test]
    fn parse_api_error_falls_back_to_raw_body() {
        assert_eq!(parse_api_error("boom", 500), "HTTP 500: boom");
        assert_eq!(
            parse_api_error(r#"{"error": {"message": "m"}}"#, 400),
            "m"
        );
    }

    #[test]
    fn parse_retry_after_accepts_seconds_only() {
        assert_eq!(parse_retry_after_secs("2"), Some(2000));
        assert_eq!(parse_retry_after_secs(" 10 "), Some(10_000));
        assert_eq!(parse_retry_after_secs("Wed, 21 Oct 2015"), None);
    }

    #[test]
    fn parse_retry_after_saturates_on_huge_values() {
        assert_eq!(
            parse_retry_after_secs("18446744073709551615"),
            Some(u64::MAX)
        );
    }
}
