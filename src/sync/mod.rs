//! Draft persistence, debounced remote pushes and session attach.

pub mod attach;
pub mod autosave;
pub mod debounce;
pub mod diff;
pub mod gateway;

pub use attach::SessionAttachCoordinator;
pub use autosave::AutosaveEngine;
pub use debounce::DeferredTask;
pub use diff::diff_fields;
pub use gateway::{AttachOutcome, HttpSessionGateway, SessionAck, SessionGateway};
