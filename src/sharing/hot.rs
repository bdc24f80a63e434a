//! # HotResource: the live instance backing a shared resource.
//!
//! One hot instance = one producer run spawned on the host scope, plus the
//! signals the state machine and its consumers observe.
//!
//! ## Architecture
//! ```text
//! HotResource::start(host, resource)
//!   └─► host.spawn(task):             (Finish guard created before the spawn)
//!         hot_scope = host.child()
//!         resource.using(hot_scope, |value, body_scope| {
//!             slot.value = value; HotReady
//!             shutdown or body_scope cancelled   ◄── stop() / cancel()
//!         })                           ─► Err(e) ⇒ failure = e; HotFailed (unless Canceled)
//!         hot_scope.join(); HotStopped
//!         on_done(); done.cancel()
//! ```
//!
//! ## Rules
//! - `value` and `failure` are each written at most once; every waiter sees the
//!   same outcome.
//! - A failure wins over a value: waiters attached to a failed instance get the error.
//! - `done` fires only after the producer task and everything under the hot scope
//!   were joined.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::ResourceError;
use crate::events::{Event, EventKind};
use crate::resource::Resource;
use crate::scope::Scope;

/// Outcome slot shared by every waiter.
struct Slot<T> {
    value: Option<T>,
    failure: Option<ResourceError>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            value: None,
            failure: None,
        }
    }
}

/// Notifies the owner, then fires `done`; also when the hot task is dropped unpolled.
struct Finish<F: FnOnce()> {
    on_done: Option<F>,
    done: CancellationToken,
}

impl<F: FnOnce()> Drop for Finish<F> {
    fn drop(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            on_done();
        }
        self.done.cancel();
    }
}

/// Live backing instance of a shared resource.
pub(crate) struct HotResource<T> {
    id: u64,
    name: Arc<str>,
    /// Token of the hot scope (forced stop).
    cancel: CancellationToken,
    /// Termination switch (graceful stop).
    shutdown: CancellationToken,
    /// Fires once the producer task was joined.
    done: CancellationToken,
    slot: watch::Receiver<Slot<T>>,
}

impl<T: Clone + Send + Sync + 'static> HotResource<T> {
    /// Spawns one producer run of `resource` on `host`.
    ///
    /// `on_done` runs right before `done` fires.
    pub(crate) fn start<F>(host: &Scope, resource: &Resource<T>, id: u64, on_done: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let name = resource.name_arc();
        host.publish(Event::new(EventKind::HotStarting).with_resource(Arc::clone(&name)));

        let scope = host.child();
        let cancel = scope.token().clone();
        let shutdown = CancellationToken::new();
        let done = CancellationToken::new();
        let (tx, rx) = watch::channel(Slot::empty());

        let resource = resource.clone();
        let task_name = Arc::clone(&name);
        let task_shutdown = shutdown.clone();
        let finish = Finish {
            on_done: Some(on_done),
            done: done.clone(),
        };

        host.spawn(async move {
            let _finish = finish;
            let scope = scope;

            let produced = resource
                .using(&scope, |value, body_scope| {
                    tx.send_modify(|slot| slot.value = Some(value));
                    scope.publish(Event::new(EventKind::HotReady).with_resource(Arc::clone(&task_name)));
                    async move {
                        tokio::select! {
                            _ = task_shutdown.cancelled() => {}
                            _ = body_scope.cancelled() => {}
                        }
                    }
                })
                .await;

            if let Err(err) = produced {
                tracing::debug!(resource = %task_name, error = %err, "shared producer ended without value");
                // Cancellation is a stop, not a fault.
                if err != ResourceError::Canceled {
                    scope.publish(
                        Event::new(EventKind::HotFailed)
                            .with_resource(Arc::clone(&task_name))
                            .with_reason(err.as_message()),
                    );
                }
                tx.send_modify(|slot| slot.failure = Some(err));
            }

            scope.join().await;
            scope.publish(Event::new(EventKind::HotStopped).with_resource(task_name));
        });

        Self {
            id,
            name,
            cancel,
            shutdown,
            done,
            slot: rx,
        }
    }

    /// Waits for the produced value (or the failure) of this instance.
    ///
    /// # Panics
    /// Panics if the producer task ended with neither a value nor a failure:
    /// the host scope did not outlive its users.
    pub(crate) async fn value(&self) -> Result<T, ResourceError> {
        let mut slot = self.slot.clone();
        loop {
            {
                let current = slot.borrow_and_update();
                if let Some(err) = &current.failure {
                    return Err(err.clone());
                }
                if let Some(value) = &current.value {
                    return Ok(value.clone());
                }
            }
            if self.done.is_cancelled() {
                panic!("outlived shared resource `{}`, used out of scope", self.name);
            }
            tokio::select! {
                changed = slot.changed() => {
                    if changed.is_err() {
                        self.done.cancelled().await;
                    }
                }
                _ = self.done.cancelled() => {}
            }
        }
    }
}

impl<T> HotResource<T> {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.slot.borrow().failure.is_some()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Fires the termination switch; the producer decides when to exit.
    pub(crate) fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Cancels the hot scope, then fires the switch.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
        self.shutdown.cancel();
    }

    /// Completes once the producer task was joined.
    pub(crate) fn finished(&self) -> WaitForCancellationFuture<'_> {
        self.done.cancelled()
    }
}
