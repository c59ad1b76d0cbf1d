#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod http;
pub mod store;
pub mod sync;

pub use app::SyncRuntime;
pub use config::Config;
pub use error::{ApiError, ConfigError, StoreError, SyncError};
