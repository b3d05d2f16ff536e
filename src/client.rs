use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::types::{ChatCompletionRequest, Message, ModelId};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A lazy, forward-only sequence of reply fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Source of streamed completions.
///
/// The session depends on this trait rather than on [`Gateway`] so that it can be
/// driven by any provider, or by a scripted client in tests.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Starts a streaming completion of `messages` with the model named `model`.
    ///
    /// Failures may surface either here or from the returned stream.
    async fn stream_completion(&self, model: &str, messages: &[Message])
    -> Result<FragmentStream>;
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
///
/// The provider, and with it the endpoint and credential, is chosen by the prefix
/// of the model identifier, e.g. `groq/llama-3.1-8b-instant`.
#[derive(Debug, Clone)]
pub struct Gateway {
    credentials: Credentials,
    client: ReqwestClient,
    base_url: Option<String>,
    timeout: Duration,
}

impl Gateway {
    /// Create a new client with the given credentials.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_options(credentials, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `base_url` replaces every provider's endpoint base when set.
    pub fn with_options(
        credentials: Credentials,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::transport(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            credentials,
            client,
            base_url,
            timeout,
        })
    }

    /// Resolve the `chat/completions` URL for a model.
    fn endpoint(&self, model: &ModelId) -> Result<Url> {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| model.provider.base_url());
        let base = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        Ok(base.join("chat/completions")?)
    }

    /// Create and return headers for a streaming request.
    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            Error::authentication("API key contains characters not allowed in a header")
        })?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::transport(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        // Some providers wrap the error object in a single-element array.
        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .or_else(|| {
                serde_json::from_str::<Vec<ErrorResponse>>(&error_body)
                    .ok()
                    .and_then(|v| v.into_iter().next())
            })
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|d| d.error_type.clone());
        let error_message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| error_body.trim().to_string());

        match status_code {
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message),
        }
    }
}

#[async_trait::async_trait]
impl CompletionClient for Gateway {
    async fn stream_completion(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream> {
        let model: ModelId = model.parse()?;
        let api_key = self.credentials.key(model.provider).ok_or_else(|| {
            Error::authentication(format!(
                "{} is not set; it is required for {} models",
                model.provider.credential_var(),
                model.provider
            ))
        })?;
        let url = self.endpoint(&model)?;
        let body = ChatCompletionRequest {
            model: &model.name,
            messages,
            stream: true,
        };

        tracing::debug!(%url, model = %model, messages = messages.len(), "starting completion");
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .headers(self.headers(api_key)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else {
                    let what = if e.is_connect() {
                        "could not connect"
                    } else {
                        "request failed"
                    };
                    Error::transport(format!("{what}: {e}"), Some(Box::new(e)))
                }
            })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "completion request rejected");
            return Err(err);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials::default().with_key(Provider::Groq, "test-key")
    }

    fn sse_body(fragments: &[&str]) -> String {
        let mut body = String::new();
        for fragment in fragments {
            body.push_str(&format!(
                "data: {}\n\n",
                serde_json::json!({
                    "object": "chat.completion.chunk",
                    "choices": [{"index": 0, "delta": {"content": fragment}}]
                })
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[test]
    fn test_client_creation() {
        let client = Gateway::new(credentials()).unwrap();
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert!(client.base_url.is_none());

        let client = Gateway::with_options(
            credentials(),
            Some("https://custom-api.example.com/v1".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn endpoint_per_provider() {
        let client = Gateway::new(credentials()).unwrap();
        let groq = client
            .endpoint(&"groq/llama-3.1-8b-instant".parse().unwrap())
            .unwrap();
        assert_eq!(
            groq.as_str(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        let gemini = client
            .endpoint(&"gemini/gemini-2.0-flash".parse().unwrap())
            .unwrap();
        assert_eq!(
            gemini.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn endpoint_override_keeps_path() {
        let client = Gateway::with_options(
            credentials(),
            Some("http://localhost:8080/v1".to_string()),
            None,
        )
        .unwrap();
        let url = client.endpoint(&"groq/x".parse().unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn streams_fragments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["Hel", "lo!"]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = Gateway::with_options(credentials(), Some(server.uri()), None).unwrap();
        let stream = client
            .stream_completion("groq/llama-3.1-8b-instant", &[Message::user("hi")])
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, vec!["Hel", "lo!"]);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = Gateway::with_options(credentials(), Some(server.uri()), None).unwrap();
        let err = match client
            .stream_completion("groq/llama-3.1-8b-instant", &[Message::user("hi")])
            .await
        {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.is_authentication());
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn server_error_keeps_body_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_raw("upstream down", "text/plain"))
            .mount(&server)
            .await;

        let client = Gateway::with_options(credentials(), Some(server.uri()), None).unwrap();
        let err = match client.stream_completion("groq/m", &[]).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert_eq!(err.status_code(), Some(503));
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_request() {
        let client = Gateway::new(credentials()).unwrap();
        let err = match client.stream_completion("gemini/gemini-2.0-flash", &[]).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.is_authentication());
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn unknown_model_fails_before_request() {
        let client = Gateway::new(credentials()).unwrap();
        let err = match client.stream_completion("llama-3.1-8b-instant", &[]).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.is_validation());
    }
}
