use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

/// A single cancelable deferred task: trailing-edge debounce timer.
///
/// `reset` cancels whatever is armed and schedules `task` after `delay`.
/// Only the sleep is cancelable; once the delay elapses the task runs on its
/// own spawned future and a later `reset` cannot interrupt it.
#[derive(Default)]
pub struct DeferredTask {
    armed: Mutex<Option<JoinHandle<()>>>,
}

impl DeferredTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            warn!("no async runtime; deferred task dropped");
            return;
        };
        let mut armed = self
            .armed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = armed.take() {
            previous.abort();
        }
        *armed = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        }));
    }

    /// Cancel the armed timer. Returns true when a timer was still sleeping.
    pub fn cancel(&self) -> bool {
        let mut armed = self
            .armed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match armed.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DeferredTask {
    fn drop(&mut self) {
        if let Some(handle) = self
            .armed
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
