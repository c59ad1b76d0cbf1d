use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::debounce::DeferredTask;
use super::diff::diff_fields;
use super::gateway::{SessionAck, SessionGateway};
use crate::auth::TokenRefreshGate;
use crate::error::{ApiError, StoreError};
use crate::form::{Answers, FieldMap, FormState};
use crate::store::{LocalStore, keys};

struct Buffers {
    /// Latest full field map not yet acknowledged by the server.
    pending: Option<FieldMap>,
    /// Last field map the server acknowledged for the stored session.
    acknowledged: FieldMap,
}

struct Inner {
    store: Arc<dyn LocalStore>,
    gateway: Arc<dyn SessionGateway>,
    /// Sessions created while signed in need no attach.
    auth: Option<Arc<TokenRefreshGate>>,
    /// Field map of an untouched questionnaire.
    baseline: FieldMap,
    buffers: Mutex<Buffers>,
    /// Serializes pushes so a timer push and a flush never interleave.
    push_lock: tokio::sync::Mutex<()>,
}

/// Keeps the local draft current on every edit and converges the remote
/// session toward it with debounced diff pushes.
pub struct AutosaveEngine {
    inner: Arc<Inner>,
    quiet_period: Duration,
    timer: DeferredTask,
}

impl AutosaveEngine {
    pub fn new(
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn SessionGateway>,
        quiet_period: Duration,
    ) -> Self {
        Self::build(store, gateway, None, quiet_period)
    }

    /// Like [`new`](Self::new), but sessions created while `gate` is signed
    /// in are not flagged for attach.
    pub fn with_auth(
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn SessionGateway>,
        gate: Arc<TokenRefreshGate>,
        quiet_period: Duration,
    ) -> Self {
        Self::build(store, gateway, Some(gate), quiet_period)
    }

    fn build(
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn SessionGateway>,
        auth: Option<Arc<TokenRefreshGate>>,
        quiet_period: Duration,
    ) -> Self {
        let baseline = Answers::default().to_fields();
        let acknowledged = load_acknowledged(store.as_ref(), &baseline);
        Self {
            inner: Arc::new(Inner {
                store,
                gateway,
                auth,
                baseline,
                buffers: Mutex::new(Buffers {
                    pending: None,
                    acknowledged,
                }),
                push_lock: tokio::sync::Mutex::new(()),
            }),
            quiet_period,
            timer: DeferredTask::new(),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn has_pending(&self) -> bool {
        self.inner.lock_buffers().pending.is_some()
    }

    /// Persist `state` as the draft right away, then (re)arm the push timer.
    pub fn record_change(&self, state: &FormState) {
        if let Err(e) = self.inner.write_draft(state) {
            warn!(error = %e, "could not persist draft");
        }
        self.inner.lock_buffers().pending = Some(state.answers.to_fields());

        let inner = Arc::clone(&self.inner);
        self.timer.reset(self.quiet_period, async move {
            if let Err(e) = inner.push(None).await {
                warn!(error = %e, "autosave push failed; will retry on next edit");
            }
        });
    }

    /// Cancel the timer and push whatever is pending now. Failures are
    /// logged and swallowed like any autosave push. Returns true when the
    /// server acknowledged a push.
    pub async fn flush_now(&self) -> bool {
        self.timer.cancel();
        match self.inner.push(None).await {
            Ok(ack) => ack.is_some(),
            Err(e) => {
                warn!(error = %e, "flush failed; draft kept locally");
                false
            }
        }
    }

    /// Final push with `completed: true`. Unlike autosave, errors surface.
    pub async fn submit(&self, state: &FormState) -> Result<SessionAck, ApiError> {
        self.timer.cancel();
        self.inner.write_draft(state)?;
        self.inner.lock_buffers().pending = Some(state.answers.to_fields());

        let ack = self
            .inner
            .push(Some(true))
            .await?
            .ok_or_else(|| ApiError::Decode("submit produced no push".into()))?;
        info!(session_id = %ack.session_id, completed = ack.completed, "questionnaire submitted");
        Ok(ack)
    }

    /// Forget the timer and both buffers once the session has been handed
    /// to an account.
    pub fn reset(&self) {
        self.timer.cancel();
        let mut buffers = self.inner.lock_buffers();
        buffers.pending = None;
        buffers.acknowledged = self.inner.baseline.clone();
    }

    pub async fn shutdown(&self) {
        if self.timer.is_armed() || self.has_pending() {
            self.flush_now().await;
        }
    }
}

/// The acknowledged map only means something while its session id is stored.
fn load_acknowledged(store: &dyn LocalStore, baseline: &FieldMap) -> FieldMap {
    let has_session = matches!(store.get(keys::SESSION_ID), Ok(Some(id)) if !id.is_empty());
    if !has_session {
        return baseline.clone();
    }
    match store.get(keys::ACKNOWLEDGED) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "discarding unreadable acknowledged snapshot");
            baseline.clone()
        }),
        Ok(None) => baseline.clone(),
        Err(e) => {
            warn!(error = %e, "could not read acknowledged snapshot");
            baseline.clone()
        }
    }
}

impl Inner {
    fn lock_buffers(&self) -> std::sync::MutexGuard<'_, Buffers> {
        self.buffers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_draft(&self, state: &FormState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(state).map_err(|e| StoreError::Serialize {
            key: keys::DRAFT.into(),
            message: e.to_string(),
        })?;
        self.store.set(keys::DRAFT, &raw)
    }

    /// Lazily create the remote session, then send the diff between the
    /// pending buffer and the acknowledged snapshot. `completed` forces a
    /// request even when nothing is pending or changed.
    async fn push(&self, completed: Option<bool>) -> Result<Option<SessionAck>, ApiError> {
        let _serial = self.push_lock.lock().await;
        let has_session = self
            .store
            .get(keys::SESSION_ID)?
            .is_some_and(|id| !id.is_empty());

        let (current, changed) = {
            let mut buffers = self.lock_buffers();
            if !has_session {
                buffers.acknowledged = self.baseline.clone();
            }
            let current = match (&buffers.pending, completed) {
                (Some(pending), _) => pending.clone(),
                (None, Some(_)) => buffers.acknowledged.clone(),
                (None, None) => return Ok(None),
            };
            let changed = diff_fields(&buffers.acknowledged, &current);
            (current, changed)
        };

        if changed.is_empty() && completed.is_none() {
            debug!("nothing changed since last acknowledged push");
            self.acknowledge(current);
            return Ok(None);
        }

        let session_id = self.ensure_session().await?;
        let ack = self
            .gateway
            .update_session(&session_id, &changed, completed)
            .await?;
        debug!(%session_id, fields = changed.len(), "pushed session diff");
        self.persist_acknowledged(&current);
        self.acknowledge(current);
        Ok(Some(ack))
    }

    async fn ensure_session(&self) -> Result<String, ApiError> {
        if let Some(id) = self.store.get(keys::SESSION_ID)?
            && !id.is_empty()
        {
            return Ok(id);
        }

        let id = self.gateway.create_session(None).await?;
        let anonymous = self.auth.as_ref().is_none_or(|gate| !gate.is_signed_in());
        let mut writes = vec![(keys::SESSION_ID, Some(id.clone()))];
        if anonymous {
            writes.push((keys::PENDING_ATTACH, Some("true".into())));
        }
        self.store.write_batch(&writes)?;
        info!(session_id = %id, anonymous, "created remote session");
        Ok(id)
    }

    fn persist_acknowledged(&self, pushed: &FieldMap) {
        let saved = serde_json::to_string(pushed)
            .map_err(|e| StoreError::Serialize {
                key: keys::ACKNOWLEDGED.into(),
                message: e.to_string(),
            })
            .and_then(|raw| self.store.set(keys::ACKNOWLEDGED, &raw));
        if let Err(e) = saved {
            warn!(error = %e, "could not persist acknowledged snapshot");
        }
    }

    /// `pushed` becomes the acknowledged snapshot. Pending is cleared only if
    /// no newer edit arrived while the push was in flight.
    fn acknowledge(&self, pushed: FieldMap) {
        let mut buffers = self.lock_buffers();
        if buffers.pending.as_ref() == Some(&pushed) {
            buffers.pending = None;
        }
        buffers.acknowledged = pushed;
    }
}
