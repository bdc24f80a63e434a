//! # Single-shot hand-off from a producer to its waiting consumer.
//!
//! A producer receives exactly one [`Emitter`]. Calling [`Emitter::emit`] hands
//! the value to the waiting side and suspends the producer until its
//! termination switch fires; it then yields a [`Consumed`] proof.
//!
//! `emit` takes the emitter by value, so emitting twice does not compile:
//!
//! ```compile_fail
//! use taskshare::Resource;
//!
//! let twice = Resource::new(|_scope, emitter| async move {
//!     let _ = emitter.emit(1).await;
//!     Ok(emitter.emit(2).await)
//! });
//! ```
//!
//! and [`Consumed`] has no public constructor, so a producer cannot finish
//! successfully without emitting:
//!
//! ```compile_fail
//! use taskshare::{Consumed, Resource};
//!
//! let never = Resource::<u32>::new(|_scope, _emitter| async move {
//!     Ok(Consumed { _private: () })
//! });
//! ```

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Proof that a producer handed off its value and was released.
///
/// Only [`Emitter::emit`] can create one.
#[derive(Debug)]
#[must_use = "return the proof from the producer"]
pub struct Consumed {
    _private: (),
}

/// Single-shot callback handing a value from a producer to its consumer.
pub struct Emitter<T> {
    tx: oneshot::Sender<T>,
    shutdown: CancellationToken,
}

impl<T> Emitter<T> {
    pub(crate) fn new(tx: oneshot::Sender<T>, shutdown: CancellationToken) -> Self {
        Self { tx, shutdown }
    }

    /// Hands `value` to the consumer and waits until the consumer is done with it.
    ///
    /// Returns once the termination switch fires (the consumer's body finished,
    /// failed, or was cancelled). Cleanup of whatever backs `value` belongs
    /// after this call.
    pub async fn emit(self, value: T) -> Consumed {
        // A gone consumer still fires the switch through its teardown guard.
        let _ = self.tx.send(value);
        self.shutdown.cancelled().await;
        Consumed { _private: () }
    }

    /// Returns `true` if the termination switch already fired.
    pub fn is_released(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("released", &self.shutdown.is_cancelled())
            .finish()
    }
}
