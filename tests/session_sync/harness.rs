use std::sync::Arc;

use reqwest::Url;
use serde_json::{Value, json};
use stridesync::auth::TokenPair;
use stridesync::http::{ApiClient, build_api_client_with_timeout};
use stridesync::store::{LocalStore, MemoryStore, keys};
use stridesync::sync::HttpSessionGateway;
use stridesync::{Config, SyncRuntime};
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
    pub runtime: SyncRuntime,
}

impl Harness {
    pub async fn start(debounce_ms: u64) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.autosave.debounce_ms = debounce_ms;
        let runtime = SyncRuntime::with_store(&config, store.clone())
            .expect("runtime should build against the mock server");
        Self {
            server,
            store,
            runtime,
        }
    }

    pub fn sign_in(&self, access: &str, refresh: &str) {
        self.runtime
            .gate()
            .install(TokenPair::new(access, refresh))
            .expect("tokens should persist");
    }

    /// A gateway sharing the runtime's refresh gate.
    pub fn gateway(&self) -> HttpSessionGateway {
        let base = Url::parse(&self.server.uri()).expect("mock server uri");
        let http = build_api_client_with_timeout(5, 5);
        let api = ApiClient::new(http, base, Arc::clone(self.runtime.gate()));
        HttpSessionGateway::new(Arc::new(api))
    }

    pub fn seed_anonymous_session(&self, session_id: &str) {
        self.store
            .write_batch(&[
                (keys::SESSION_ID, Some(session_id.to_string())),
                (keys::PENDING_ATTACH, Some("true".into())),
                (keys::DRAFT, Some(r#"{"step":"goal","answers":{}}"#.into())),
            ])
            .expect("seed should persist");
    }
}

pub fn token_body(n: u32) -> Value {
    json!({
        "access_token": format!("access-{n}"),
        "refresh_token": format!("refresh-{n}"),
    })
}
