//! Token persistence and the single-flight refresh gate.

pub mod gate;
pub mod refresh;
pub mod tokens;

pub use gate::{TokenRefreshGate, TokenRefresher};
pub use refresh::HttpTokenRefresher;
pub use tokens::{TokenPair, TokenStore};
