use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::{HttpTokenRefresher, TokenPair, TokenRefreshGate, TokenStore};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::form::FormStateMachine;
use crate::http::{ApiClient, build_api_client};
use crate::store::{FileStore, LocalStore, keys};
use crate::sync::{
    AttachOutcome, AutosaveEngine, HttpSessionGateway, SessionAttachCoordinator, SessionGateway,
};

/// Wires the store, refresh gate, API client and sync components together.
pub struct SyncRuntime {
    store: Arc<dyn LocalStore>,
    gate: Arc<TokenRefreshGate>,
    autosave: AutosaveEngine,
    attach: SessionAttachCoordinator,
}

impl SyncRuntime {
    /// Open the state file named by `config` and talk to `config.api`.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.state_path();
        let store: Arc<dyn LocalStore> = Arc::new(FileStore::open(path.clone())?);
        info!(path = %path.display(), "opened local state");
        Self::with_store(config, store)
    }

    pub fn with_store(config: &Config, store: Arc<dyn LocalStore>) -> Result<Self> {
        let base_url = config.api_url()?;
        let http = build_api_client(&config.api);

        let refresher = Arc::new(HttpTokenRefresher::new(http.clone(), &base_url));
        let gate = Arc::new(TokenRefreshGate::new(
            TokenStore::load(Arc::clone(&store))?,
            refresher,
        ));
        let api = Arc::new(ApiClient::new(http, base_url, Arc::clone(&gate)));
        let gateway: Arc<dyn SessionGateway> = Arc::new(HttpSessionGateway::new(api));

        Ok(Self::from_parts(store, gate, gateway, config.debounce()))
    }

    pub fn from_parts(
        store: Arc<dyn LocalStore>,
        gate: Arc<TokenRefreshGate>,
        gateway: Arc<dyn SessionGateway>,
        quiet_period: Duration,
    ) -> Self {
        Self {
            autosave: AutosaveEngine::with_auth(
                Arc::clone(&store),
                Arc::clone(&gateway),
                Arc::clone(&gate),
                quiet_period,
            ),
            attach: SessionAttachCoordinator::new(Arc::clone(&store), gateway),
            store,
            gate,
        }
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub fn gate(&self) -> &Arc<TokenRefreshGate> {
        &self.gate
    }

    pub fn autosave(&self) -> &AutosaveEngine {
        &self.autosave
    }

    pub fn attach(&self) -> &SessionAttachCoordinator {
        &self.attach
    }

    pub fn restore_form(&self) -> FormStateMachine {
        FormStateMachine::restore(self.store.as_ref())
    }

    /// Call once per successful login or registration. Edits still inside the
    /// quiet period are pushed to the anonymous session first, then tokens go
    /// in so the attach request is authenticated.
    pub async fn on_authenticated(&self, tokens: TokenPair) -> Result<Option<AttachOutcome>> {
        if self.autosave.has_pending() && !self.autosave.flush_now().await {
            warn!("draft not pushed before sign-in; it will go to a new session");
        }
        self.gate.install(tokens)?;
        info!("signed in");
        Ok(self.attach.attach_pending().await?)
    }

    pub fn logout(&self) -> Result<()> {
        self.gate.clear()?;
        info!("signed out");
        Ok(())
    }

    /// Forget the draft and any anonymous session. Tokens are kept.
    pub fn reset_local(&self) -> std::result::Result<(), StoreError> {
        self.store.write_batch(&[
            (keys::DRAFT, None),
            (keys::SESSION_ID, None),
            (keys::PENDING_ATTACH, None),
            (keys::ACKNOWLEDGED, None),
        ])?;
        self.autosave.reset();
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.autosave.shutdown().await;
    }
}
