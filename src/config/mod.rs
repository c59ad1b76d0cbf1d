//! `~/.stridesync/config.toml` plus `STRIDESYNC_*` env overrides.

mod env_overrides;
mod loader;
#[cfg(test)]
pub(crate) mod test_env;
mod types;

pub use types::{ApiConfig, AutosaveConfig, Config, DEBOUNCE_RANGE_MS, StorageConfig};
