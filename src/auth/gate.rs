use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::tokens::{TokenPair, TokenStore};
use crate::error::{ApiError, StoreError};

/// Issues the `/auth/refresh` network call.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenPair, ApiError>> + Send + 'a>>;
}

type Waiter = oneshot::Sender<Result<String, ApiError>>;

enum GateState {
    Idle,
    /// One refresh is in flight; callers that hit a 401 meanwhile queue here
    /// and are released in arrival order.
    Refreshing { waiters: VecDeque<Waiter> },
}

/// Serializes token renewal so that N concurrent 401s cause exactly one
/// refresh call. Every authenticated request goes through [`run`](Self::run).
///
/// The state lock is never held across an await; suspension happens only on
/// the request itself, the refresh call, and a waiter's channel.
pub struct TokenRefreshGate {
    tokens: TokenStore,
    refresher: Arc<dyn TokenRefresher>,
    state: Mutex<GateState>,
}

impl TokenRefreshGate {
    pub fn new(tokens: TokenStore, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            tokens,
            refresher,
            state: Mutex::new(GateState::Idle),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.access_token()
    }

    pub fn is_signed_in(&self) -> bool {
        self.tokens.current().is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
            GateState::Refreshing { .. }
        )
    }

    /// Install the pair obtained from login or registration.
    pub fn install(&self, pair: TokenPair) -> Result<(), StoreError> {
        self.tokens.replace(pair)
    }

    /// Sign out locally.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.tokens.clear()
    }

    /// Send `request` with the current access token. On a 401 the token is
    /// renewed (or awaited if another caller is already renewing) and the
    /// request is retried exactly once; a second 401 is returned as-is.
    pub async fn run<T, F, Fut>(&self, mut request: F) -> Result<T, ApiError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let sent_with = self.access_token();
        match request(sent_with.clone()).await {
            Err(ApiError::Unauthorized) => {}
            other => return other,
        }

        let fresh = self.renew_after_unauthorized(sent_with.as_deref()).await?;
        request(Some(fresh)).await
    }

    async fn renew_after_unauthorized(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let waiting = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match &mut *state {
                GateState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push_back(tx);
                    Some(rx)
                }
                GateState::Idle => {
                    // A refresh already finished after this request went out.
                    if let Some(current) = self.tokens.access_token()
                        && stale != Some(current.as_str())
                    {
                        return Ok(current);
                    }
                    *state = GateState::Refreshing {
                        waiters: VecDeque::new(),
                    };
                    None
                }
            }
        };

        match waiting {
            Some(rx) => {
                debug!("refresh in flight; queued behind it");
                rx.await.unwrap_or(Err(ApiError::RefreshAborted))
            }
            None => self.lead_refresh().await,
        }
    }

    async fn lead_refresh(&self) -> Result<String, ApiError> {
        let mut guard = InFlight {
            gate: self,
            settled: false,
        };

        let outcome = match self.tokens.refresh_token() {
            Some(refresh_token) => {
                info!("access token rejected; refreshing");
                self.refresher.refresh(&refresh_token).await
            }
            None => Err(ApiError::AuthExpired {
                reason: "no refresh token stored".into(),
            }),
        };

        guard.settled = true;
        match outcome {
            Ok(pair) => {
                let access = pair.access_token().to_string();
                if let Err(e) = self.tokens.replace(pair) {
                    error!(error = %e, "could not persist refreshed tokens; keeping them in memory");
                }
                self.release(Ok(access.clone()));
                Ok(access)
            }
            Err(failure) => {
                let reason = match failure {
                    ApiError::AuthExpired { reason } => reason,
                    other => other.to_string(),
                };
                warn!(%reason, "token refresh failed; signing out");
                if let Err(e) = self.tokens.clear() {
                    error!(error = %e, "could not clear stored tokens");
                }
                self.release(Err(reason.clone()));
                Err(ApiError::AuthExpired { reason })
            }
        }
    }

    /// Back to Idle, then wake every waiter in FIFO order. Success hands each
    /// the same new token; failure rejects them all.
    fn release(&self, outcome: Result<String, String>) {
        let waiters = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match std::mem::replace(&mut *state, GateState::Idle) {
                GateState::Refreshing { waiters } => waiters,
                GateState::Idle => VecDeque::new(),
            }
        };
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "releasing refresh waiters");

        for waiter in waiters {
            let message = match &outcome {
                Ok(access) => Ok(access.clone()),
                Err(reason) => Err(ApiError::AuthExpired {
                    reason: reason.clone(),
                }),
            };
            // A waiter whose caller went away is fine to skip.
            let _ = waiter.send(message);
        }
    }

    fn abandon(&self) {
        let waiters = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match std::mem::replace(&mut *state, GateState::Idle) {
                GateState::Refreshing { waiters } => waiters,
                GateState::Idle => VecDeque::new(),
            }
        };
        warn!(waiters = waiters.len(), "token refresh abandoned");
        for waiter in waiters {
            let _ = waiter.send(Err(ApiError::RefreshAborted));
        }
    }
}

/// Returns the gate to Idle if the future leading a refresh is dropped
/// before the refresh settles.
struct InFlight<'a> {
    gate: &'a TokenRefreshGate,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LocalStore, MemoryStore, keys};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeRefresher {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl FakeRefresher {
        fn ok(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay,
            })
        }

        fn failing(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
                delay,
            })
        }
    }

    impl TokenRefresher for FakeRefresher {
        fn refresh<'a>(
            &'a self,
            refresh_token: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<TokenPair, ApiError>> + Send + 'a>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(self.delay).await;
                if self.fail {
                    return Err(ApiError::Status {
                        status: 401,
                        body: format!("refresh token {refresh_token} revoked"),
                    });
                }
                Ok(TokenPair::new(format!("access-{n}"), format!("refresh-{n}")))
            })
        }
    }

    fn gate_with(refresher: Arc<FakeRefresher>) -> (Arc<TokenRefreshGate>, Arc<MemoryStore>) {
        let backing = Arc::new(MemoryStore::new());
        let tokens = TokenStore::load(backing.clone()).unwrap();
        tokens.replace(TokenPair::new("access-0", "refresh-0")).unwrap();
        (Arc::new(TokenRefreshGate::new(tokens, refresher)), backing)
    }

    /// Simulated endpoint: accepts only `valid`, records every token it saw.
    async fn endpoint(
        token: Option<String>,
        valid: &str,
        seen: &Mutex<Vec<Option<String>>>,
    ) -> Result<String, ApiError> {
        seen.lock().unwrap().push(token.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        match token {
            Some(t) if t == valid => Ok(format!("ok:{t}")),
            _ => Err(ApiError::Unauthorized),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_401s_share_one_refresh() {
        let refresher = FakeRefresher::ok(Duration::from_millis(50));
        let (gate, _) = gate_with(refresher.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            let seen = Arc::clone(&seen);
            handles.push(tokio::spawn(async move {
                gate.run(|token| endpoint(token, "access-1", &seen)).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "ok:access-1");
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert!(!gate.is_refreshing());

        let seen = seen.lock().unwrap();
        let retried = seen
            .iter()
            .filter(|t| t.as_deref() == Some("access-1"))
            .count();
        assert_eq!(retried, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_rejects_all_and_clears_tokens() {
        let refresher = FakeRefresher::failing(Duration::from_millis(50));
        let (gate, backing) = gate_with(refresher.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            let seen = Arc::clone(&seen);
            handles.push(tokio::spawn(async move {
                gate.run(|token| endpoint(token, "never", &seen)).await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, ApiError::AuthExpired { .. }), "{err:?}");
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert!(!gate.is_signed_in());
        assert!(backing.get(keys::REFRESH_TOKEN).unwrap().is_none());
        // Only the three first attempts went out; nobody retried.
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_401_after_retry_fails_without_new_refresh() {
        let refresher = FakeRefresher::ok(Duration::from_millis(5));
        let (gate, _) = gate_with(refresher.clone());
        let seen = Mutex::new(Vec::new());

        let err = gate
            .run(|token| endpoint(token, "not-issued", &seen))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn signed_out_401_fails_without_network_refresh() {
        let refresher = FakeRefresher::ok(Duration::ZERO);
        let backing = Arc::new(MemoryStore::new());
        let gate = TokenRefreshGate::new(TokenStore::load(backing).unwrap(), refresher.clone());
        let seen = Mutex::new(Vec::new());

        let err = gate
            .run(|token| endpoint(token, "x", &seen))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthExpired { .. }));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_401_after_completed_refresh_reuses_new_token() {
        let refresher = FakeRefresher::ok(Duration::from_millis(5));
        let (gate, _) = gate_with(refresher.clone());
        let seen = Mutex::new(Vec::new());

        gate.run(|token| endpoint(token, "access-1", &seen))
            .await
            .unwrap();

        // A request that went out with the old token and comes back 401 later.
        let result = gate
            .renew_after_unauthorized(Some("access-0"))
            .await
            .unwrap();
        assert_eq!(result, "access-1");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_leader_releases_waiters() {
        let refresher = FakeRefresher::ok(Duration::from_secs(60));
        let (gate, _) = gate_with(refresher);

        let leader = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.renew_after_unauthorized(Some("access-0")).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(gate.is_refreshing());

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.renew_after_unauthorized(Some("access-0")).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        leader.abort();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, ApiError::RefreshAborted));
        assert!(!gate.is_refreshing());
        assert!(gate.is_signed_in());
    }

    #[tokio::test]
    async fn non_401_errors_pass_through_untouched() {
        let refresher = FakeRefresher::ok(Duration::ZERO);
        let (gate, _) = gate_with(refresher.clone());

        let err = gate
            .run(|_| async {
                Err::<(), _>(ApiError::Status {
                    status: 500,
                    body: "boom".into(),
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }
}
