//! Authenticated JSON transport for the session API.

pub mod client;

pub use client::{ApiClient, build_api_client, build_api_client_with_timeout};
