//! IBM watsonx.ai text generation client
//!
//! Exchanges the API key for an IAM bearer token (cached until shortly before it
//! expires) and calls the text generation endpoint. Failures are reported once;
//! there are no retries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::GenerationClient;
use crate::config::{Credentials, DecodingMethod, GenerationConfig, HttpConfig, WatsonxConfig};
use crate::error::{Error, GenerationFailure, Result};

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Refresh tokens this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Upstream bodies are cut to this many characters in error messages
const MAX_ERROR_BODY: usize = 500;

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model_id: &'a str,
    input: &'a str,
    parameters: GenerateParameters,
    project_id: &'a str,
}

#[derive(Serialize)]
struct GenerateParameters {
    decoding_method: DecodingMethod,
    max_new_tokens: u32,
    min_new_tokens: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

impl From<&GenerationConfig> for GenerateParameters {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            decoding_method: config.decoding_method,
            max_new_tokens: config.max_new_tokens,
            min_new_tokens: config.min_new_tokens,
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    results: Vec<GenerateResult>,
}

#[derive(Deserialize)]
struct GenerateResult {
    #[serde(default)]
    generated_text: Option<String>,
}

/// watsonx.ai client bound to one set of credentials
pub struct WatsonxClient {
    client: Client,
    credentials: Arc<Credentials>,
    settings: WatsonxConfig,
    token: RwLock<Option<CachedToken>>,
}

impl WatsonxClient {
    pub fn new(
        credentials: Arc<Credentials>,
        settings: WatsonxConfig,
        http: &HttpConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.generation_timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
            settings,
            token: RwLock::new(None),
        })
    }

    fn generation_url(&self) -> String {
        format!(
            "{}/ml/v1/text/generation?version={}",
            self.credentials.endpoint_url(),
            self.settings.api_version
        )
    }

    /// Get a valid bearer token, exchanging the API key when the cache is stale
    async fn bearer_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(ref cached) = *token {
                if cached.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut token = self.token.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(ref cached) = *token {
            if cached.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.exchange_api_key().await?;
        let access_token = fresh.access_token.clone();
        *token = Some(fresh);
        Ok(access_token)
    }

    async fn exchange_api_key(&self) -> Result<CachedToken> {
        tracing::debug!("Requesting IAM token from {}", self.settings.iam_url);

        let response = self
            .client
            .post(&self.settings.iam_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", IAM_GRANT_TYPE),
                ("apikey", self.credentials.api_key()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = truncated_body(response).await;
            return Err(Error::generation(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    GenerationFailure::Authentication(format!(
                        "IAM token exchange rejected (HTTP {}): {}",
                        status.as_u16(),
                        body
                    ))
                }
                _ => classify(status, body),
            }));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            Error::generation(GenerationFailure::MalformedResponse(format!(
                "IAM token response: {}",
                e
            )))
        })?;

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in.unwrap_or(3600)),
        })
    }

    async fn forget_token(&self) {
        *self.token.write().await = None;
    }
}

#[async_trait]
impl GenerationClient for WatsonxClient {
    #[tracing::instrument(skip(self, prompt, config), fields(model = %config.model_id))]
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let token = self.bearer_token().await?;

        let request = GenerateRequest {
            model_id: &config.model_id,
            input: prompt,
            parameters: GenerateParameters::from(config),
            project_id: self.credentials.project_id(),
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.generation_url())
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                self.forget_token().await;
            }
            let body = truncated_body(response).await;
            tracing::warn!("Generation request failed with HTTP {}", status.as_u16());
            return Err(Error::generation(classify(status, body)));
        }

        let body = response.text().await.map_err(transport)?;
        let answer = extract_generated_text(&body)?;
        tracing::info!(
            "Generated {} chars in {}ms",
            answer.len(),
            start.elapsed().as_millis()
        );
        Ok(answer)
    }

    fn name(&self) -> &str {
        "watsonx"
    }
}

/// Pull `results[0].generated_text` out of a response body, trimmed
fn extract_generated_text(body: &str) -> Result<String> {
    let malformed = |msg: String| Error::generation(GenerationFailure::MalformedResponse(msg));

    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    parsed
        .results
        .into_iter()
        .next()
        .and_then(|r| r.generated_text)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| malformed("missing results[0].generated_text".to_string()))
}

fn classify(status: StatusCode, body: String) -> GenerationFailure {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationFailure::Authentication(body),
        StatusCode::TOO_MANY_REQUESTS => GenerationFailure::RateLimited(body),
        other => GenerationFailure::Upstream {
            status: other.as_u16(),
            body,
        },
    }
}

fn transport(err: reqwest::Error) -> Error {
    Error::generation(GenerationFailure::Transport(err.to_string()))
}

async fn truncated_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    if body.chars().count() > MAX_ERROR_BODY {
        body.chars().take(MAX_ERROR_BODY).collect::<String>() + "..."
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Fixture {
        token_calls: Arc<AtomicUsize>,
        generation_status: u16,
        generation_body: Value,
        generation_delay: Duration,
        last_request: Arc<parking_lot::Mutex<Option<Value>>>,
    }

    async fn token(State(fixture): State<Fixture>, body: String) -> (axum::http::StatusCode, Json<Value>) {
        fixture.token_calls.fetch_add(1, Ordering::SeqCst);
        if body.contains("apikey=bad-key") {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"errorMessage": "Provided API key could not be found"})),
            );
        }
        (
            axum::http::StatusCode::OK,
            Json(json!({"access_token": "token-1", "expires_in": 3600})),
        )
    }

    async fn generation(
        State(fixture): State<Fixture>,
        headers: HeaderMap,
        Json(request): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        assert_eq!(
            headers.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer token-1")
        );
        *fixture.last_request.lock() = Some(request);
        tokio::time::sleep(fixture.generation_delay).await;
        (
            axum::http::StatusCode::from_u16(fixture.generation_status).unwrap(),
            Json(fixture.generation_body.clone()),
        )
    }

    async fn serve(fixture: Fixture) -> String {
        let app = Router::new()
            .route("/identity/token", post(token))
            .route("/ml/v1/text/generation", post(generation))
            .with_state(fixture);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fixture(status: u16, body: Value) -> Fixture {
        Fixture {
            token_calls: Arc::new(AtomicUsize::new(0)),
            generation_status: status,
            generation_body: body,
            generation_delay: Duration::ZERO,
            last_request: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    fn client(base: &str, api_key: &str) -> WatsonxClient {
        client_with_http(base, api_key, &HttpConfig::default())
    }

    fn client_with_http(base: &str, api_key: &str, http: &HttpConfig) -> WatsonxClient {
        let credentials = Arc::new(Credentials::new(api_key, "proj-1", base).unwrap());
        let settings = WatsonxConfig {
            iam_url: format!("{}/identity/token", base),
            ..Default::default()
        };
        WatsonxClient::new(credentials, settings, http).unwrap()
    }

    #[tokio::test]
    async fn test_slow_generation_times_out_as_transport_failure() {
        let mut slow = fixture(
            200,
            json!({"results": [{"generated_text": "too late"}]}),
        );
        slow.generation_delay = Duration::from_secs(3);
        let base = serve(slow).await;
        let http = HttpConfig {
            generation_timeout_secs: 1,
            ..Default::default()
        };

        let start = Instant::now();
        let err = client_with_http(&base, "good-key", &http)
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Generation {
                cause: GenerationFailure::Transport(_)
            }
        ));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_generate_trims_and_sends_parameters() {
        let fixture = fixture(
            200,
            json!({"results": [{"generated_text": "  Grass is green.\n", "stop_reason": "eos_token"}]}),
        );
        let seen = Arc::clone(&fixture.last_request);
        let token_calls = Arc::clone(&fixture.token_calls);
        let base = serve(fixture).await;
        let client = client(&base, "good-key");
        let config = GenerationConfig::default();

        let answer = client.generate("prompt text", &config).await.unwrap();
        assert_eq!(answer, "Grass is green.");

        let request = seen.lock().clone().unwrap();
        assert_eq!(request["model_id"], "meta-llama/llama-2-70b-chat");
        assert_eq!(request["project_id"], "proj-1");
        assert_eq!(request["input"], "prompt text");
        assert_eq!(request["parameters"]["decoding_method"], "greedy");
        assert_eq!(request["parameters"]["max_new_tokens"], 100);
        assert_eq!(request["parameters"]["min_new_tokens"], 50);

        // Second call reuses the cached token
        client.generate("again", &config).await.unwrap();
        assert_eq!(token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_api_key_is_authentication_failure() {
        let base = serve(fixture(200, json!({}))).await;
        let err = client(&base, "bad-key")
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Generation {
                cause: GenerationFailure::Authentication(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported() {
        let base = serve(fixture(429, json!({"errors": [{"code": "quota"}]}))).await;
        let err = client(&base, "good-key")
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Generation {
                cause: GenerationFailure::RateLimited(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_results_is_malformed() {
        let base = serve(fixture(200, json!({"results": []}))).await;
        let err = client(&base, "good-key")
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Generation {
                cause: GenerationFailure::MalformedResponse(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let base = serve(fixture(500, json!({"error": "boom"}))).await;
        let err = client(&base, "good-key")
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Generation {
                cause: GenerationFailure::Upstream { status: 500, .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&base, "good-key")
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Generation {
                cause: GenerationFailure::Transport(_)
            }
        ));
    }

    #[test]
    fn test_extract_generated_text() {
        assert_eq!(
            extract_generated_text(r#"{"results":[{"generated_text":" unanswerable "}]}"#).unwrap(),
            "unanswerable"
        );
        assert!(extract_generated_text("not json").is_err());
        assert!(extract_generated_text(r#"{"results":[{}]}"#).is_err());
    }
}
