//! Local persistence: a small key/value store that survives process restarts.
//!
//! Each key has exactly one owning component (draft, session id and the
//! acknowledged snapshot belong to the autosave engine and attach
//! coordinator, tokens to the refresh gate), so the store itself does no
//! cross-key coordination.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;

/// Persisted key names.
pub mod keys {
    pub const DRAFT: &str = "draft";
    pub const SESSION_ID: &str = "session_id";
    pub const PENDING_ATTACH: &str = "pending_attach";
    /// Field map the server last acknowledged for `SESSION_ID`.
    pub const ACKNOWLEDGED: &str = "acknowledged";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Synchronous key/value persistence contract.
///
/// `write_batch` applies all writes or none; `None` removes the key.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write_batch(&self, writes: &[(&str, Option<String>)]) -> Result<(), StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write_batch(&[(key, Some(value.to_string()))])
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.write_batch(&[(key, None)])
    }

    fn flag(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some_and(|v| v == "true"))
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        if value {
            self.set(key, "true")
        } else {
            self.remove(key)
        }
    }
}
