pub mod dispatch;
pub mod runtime;
pub mod status;

pub use runtime::SyncRuntime;
