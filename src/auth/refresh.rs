use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use super::gate::TokenRefresher;
use super::tokens::TokenPair;
use crate::error::ApiError;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// `POST /auth/refresh` over plain HTTP. Deliberately not routed through the
/// gate: a 401 here means the refresh token itself is dead.
pub struct HttpTokenRefresher {
    client: Client,
    url: Url,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, base_url: &Url) -> Self {
        let mut url = base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["auth", "refresh"]);
        }
        Self { client, url }
    }
}

impl TokenRefresher for HttpTokenRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenPair, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url.clone())
                .json(&RefreshRequest { refresh_token })
                .send()
                .await?;

            let status = response.status();
            debug!(status = status.as_u16(), "refresh response");
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                return Err(ApiError::AuthExpired {
                    reason: format!("refresh token rejected ({})", status.as_u16()),
                });
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = response.bytes().await?;
            serde_json::from_slice::<TokenPair>(&bytes)
                .map_err(|e| ApiError::Decode(format!("refresh response: {e}")))
        })
    }
}
