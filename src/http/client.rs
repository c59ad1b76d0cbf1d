use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::auth::TokenRefreshGate;
use crate::config::ApiConfig;
use crate::error::ApiError;

pub fn build_api_client(config: &ApiConfig) -> Client {
    build_api_client_with_timeout(config.request_timeout_secs, config.connect_timeout_secs)
}

pub fn build_api_client_with_timeout(timeout_secs: u64, connect_timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// JSON REST client whose every call passes through the refresh gate.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    gate: Arc<TokenRefreshGate>,
}

impl ApiClient {
    pub fn new(http: Client, base_url: Url, gate: Arc<TokenRefreshGate>) -> Self {
        Self {
            http,
            base_url,
            gate,
        }
    }

    pub fn gate(&self) -> &Arc<TokenRefreshGate> {
        &self.gate
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn get_json<R>(&self, segments: &[&str]) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        self.send_json(Method::GET, self.endpoint(segments), None)
            .await
    }

    pub async fn post_json<B, R>(&self, segments: &[&str], body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = encode(body)?;
        self.send_json(Method::POST, self.endpoint(segments), Some(body))
            .await
    }

    pub async fn put_json<B, R>(&self, segments: &[&str], body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = encode(body)?;
        self.send_json(Method::PUT, self.endpoint(segments), Some(body))
            .await
    }

    async fn send_json<R>(&self, method: Method, url: Url, body: Option<Value>) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let method = &method;
        let url = &url;
        let body = body.as_ref();
        self.gate
            .run(move |token| self.send_once(method.clone(), url.clone(), body, token))
            .await
    }

    async fn send_once<R>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        token: Option<String>,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let request_id = Uuid::new_v4().to_string();
        let path = url.path().to_string();

        let mut request = self
            .http
            .request(method.clone(), url)
            .header("x-request-id", &request_id);
        if let Some(token) = token.as_deref() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%request_id, %method, %path, status = status.as_u16(), "api call");

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}
