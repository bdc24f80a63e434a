//! # Deferred: a handle to a value still in production.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ResourceError;

type Slot<T> = Option<Result<T, ResourceError>>;

/// Value handed out by [`Resource::deferred`](crate::Resource::deferred).
///
/// Valid only inside the body that received it; once the body returns the
/// underlying production is released or cancelled.
pub struct Deferred<T> {
    rx: watch::Receiver<Slot<T>>,
    start: CancellationToken,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            start: self.start.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("started", &self.is_started())
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<T> Deferred<T> {
    pub(crate) fn new(rx: watch::Receiver<Slot<T>>, start: CancellationToken) -> Self {
        Self { rx, start }
    }

    /// Starts a lazy production (no-op once started).
    pub fn start(&self) {
        self.start.cancel();
    }

    /// Returns `true` once production was started.
    pub fn is_started(&self) -> bool {
        self.start.is_cancelled()
    }

    /// Returns `true` once production finished, with a value or a failure.
    pub fn is_completed(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

impl<T: Clone> Deferred<T> {
    /// Starts production if needed and waits for its outcome.
    pub async fn get(&self) -> Result<T, ResourceError> {
        self.start();
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or(Err(ResourceError::NeverEmitted)),
            // Production was cancelled before it could report anything.
            Err(_) => Err(ResourceError::Canceled),
        }
    }
}
