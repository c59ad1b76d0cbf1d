use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ApiError;
use crate::form::FieldMap;
use crate::http::ApiClient;

pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionAck {
    pub session_id: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttachOutcome {
    #[serde(default)]
    pub profile: Value,
    #[serde(default)]
    pub questionnaire_completed: bool,
}

/// The three remote session operations. Implementations must route through
/// the refresh gate; callers never deal with tokens.
pub trait SessionGateway: Send + Sync {
    /// `POST /sessions`, optionally seeded. Returns the new session id.
    fn create_session<'a>(&'a self, seed: Option<&'a FieldMap>) -> GatewayFuture<'a, String>;

    /// `PUT /sessions/{id}` with only the changed fields.
    fn update_session<'a>(
        &'a self,
        session_id: &'a str,
        payload: &'a FieldMap,
        completed: Option<bool>,
    ) -> GatewayFuture<'a, SessionAck>;

    /// `POST /sessions/{id}/attach`. Requires a signed-in caller.
    fn attach_session<'a>(&'a self, session_id: &'a str) -> GatewayFuture<'a, AttachOutcome>;
}

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a FieldMap>,
}

#[derive(Deserialize)]
struct Created {
    session_id: String,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    payload: &'a FieldMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
}

pub struct HttpSessionGateway {
    client: Arc<ApiClient>,
}

impl HttpSessionGateway {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

impl SessionGateway for HttpSessionGateway {
    fn create_session<'a>(&'a self, seed: Option<&'a FieldMap>) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            let created: Created = self
                .client
                .post_json(&["sessions"], &CreateBody { payload: seed })
                .await?;
            if created.session_id.is_empty() {
                return Err(ApiError::Decode("empty session_id".into()));
            }
            Ok(created.session_id)
        })
    }

    fn update_session<'a>(
        &'a self,
        session_id: &'a str,
        payload: &'a FieldMap,
        completed: Option<bool>,
    ) -> GatewayFuture<'a, SessionAck> {
        Box::pin(async move {
            self.client
                .put_json(&["sessions", session_id], &UpdateBody { payload, completed })
                .await
        })
    }

    fn attach_session<'a>(&'a self, session_id: &'a str) -> GatewayFuture<'a, AttachOutcome> {
        Box::pin(async move {
            self.client
                .post_json(&["sessions", session_id, "attach"], &serde_json::json!({}))
                .await
        })
    }
}
