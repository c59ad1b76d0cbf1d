use std::sync::Arc;
use tracing::{debug, info, warn};

use super::gateway::{AttachOutcome, SessionGateway};
use crate::error::ApiError;
use crate::store::{LocalStore, keys};

/// Merges the anonymous remote session into the signed-in account.
pub struct SessionAttachCoordinator {
    store: Arc<dyn LocalStore>,
    gateway: Arc<dyn SessionGateway>,
    serial: tokio::sync::Mutex<()>,
}

impl SessionAttachCoordinator {
    pub fn new(store: Arc<dyn LocalStore>, gateway: Arc<dyn SessionGateway>) -> Self {
        Self {
            store,
            gateway,
            serial: tokio::sync::Mutex::new(()),
        }
    }

    /// Session id waiting to be attached, if any.
    pub fn pending_session(&self) -> Result<Option<String>, ApiError> {
        Ok(self
            .store
            .get(keys::SESSION_ID)?
            .filter(|id| !id.is_empty()))
    }

    pub async fn attach_if_pending(&self) -> Result<bool, ApiError> {
        Ok(self.attach_pending().await?.is_some())
    }

    /// Attach the stored session. `Ok(None)` when nothing is stored. On
    /// failure the session id, flag and draft stay as they were so a later
    /// sign-in can try again.
    pub async fn attach_pending(&self) -> Result<Option<AttachOutcome>, ApiError> {
        let _serial = self.serial.lock().await;

        let Some(session_id) = self.pending_session()? else {
            debug!("no anonymous session to attach");
            return Ok(None);
        };

        let outcome = match self.gateway.attach_session(&session_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%session_id, error = %e, "session attach failed");
                return Err(e);
            }
        };

        self.store.write_batch(&[
            (keys::SESSION_ID, None),
            (keys::PENDING_ATTACH, None),
            (keys::ACKNOWLEDGED, None),
            (keys::DRAFT, None),
        ])?;
        info!(
            %session_id,
            questionnaire_completed = outcome.questionnaire_completed,
            "session attached to account"
        );
        Ok(Some(outcome))
    }
}
