use arc_swap::ArcSwapOption;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::StoreError;
use crate::store::{LocalStore, keys};

/// Access + refresh token. Buffers are wiped on drop.
#[derive(Clone, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The persisted token pair plus a lock-free in-memory copy that every
/// outbound request reads. Only the refresh gate writes through this.
pub struct TokenStore {
    store: Arc<dyn LocalStore>,
    current: ArcSwapOption<TokenPair>,
}

impl TokenStore {
    /// Load whatever pair was persisted. A half-written pair (one key only)
    /// is treated as signed out.
    pub fn load(store: Arc<dyn LocalStore>) -> Result<Self, StoreError> {
        let access = store.get(keys::ACCESS_TOKEN)?;
        let refresh = store.get(keys::REFRESH_TOKEN)?;
        let current = match (access, refresh) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Arc::new(TokenPair::new(access, refresh)))
            }
            _ => None,
        };
        Ok(Self {
            store,
            current: ArcSwapOption::new(current),
        })
    }

    pub fn current(&self) -> Option<Arc<TokenPair>> {
        self.current.load_full()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .load_full()
            .map(|pair| pair.access_token().to_string())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .load_full()
            .map(|pair| pair.refresh_token().to_string())
    }

    /// Swap in `pair` for readers, then persist both keys in one batch.
    /// Readers keep the new pair even if the disk write fails.
    pub fn replace(&self, pair: TokenPair) -> Result<(), StoreError> {
        let writes = [
            (keys::ACCESS_TOKEN, Some(pair.access_token().to_string())),
            (keys::REFRESH_TOKEN, Some(pair.refresh_token().to_string())),
        ];
        self.current.store(Some(Arc::new(pair)));
        self.store.write_batch(&writes)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.current.store(None);
        self.store
            .write_batch(&[(keys::ACCESS_TOKEN, None), (keys::REFRESH_TOKEN, None)])
    }
}
