//! # SharedResource: a ref-counted, restartable singleton over a [`Resource`].
//!
//! Every `using` call on a shared resource attaches to **at most one** running
//! [`HotResource`], starting it if needed, and releases it afterwards.
//!
//! ## State machine
//! ```text
//!              attach                      attach / release (n > 1)
//! NotRunning ─────────► Running{n=1} ◄──────────────────────────┐
//!     ▲                     │  └────────────────────────────────┘
//!     │ hot joined          │ release (last) + Stop/Cancel
//!     │                     ▼
//!     └──────────────── Stopping ── attach: wait hot joined, retry
//! ```
//!
//! ## Rules
//! - One `parking_lot::Mutex` serializes transitions; `ref_count` and the tag
//!   change together and the lock is never held across `.await`.
//! - Attaching never reuses a hot instance that finished or failed: a failed one
//!   is drained (`Stopping`) and replaced on the next attempt.
//! - Releases are matched by hot instance id: a late release for a replaced
//!   instance does not touch the current state.

use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::hot::HotResource;
use super::mode::{SharingMode, StopMode};
use crate::error::ResourceError;
use crate::events::{Event, EventKind};
use crate::resource::{Emitter, Resource};
use crate::scope::Scope;

/// Observable state of a shared resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharingState {
    /// No producer is running.
    NotRunning,
    /// A producer is running with `ref_count` attached consumers.
    Running {
        /// Attached consumers.
        ref_count: usize,
    },
    /// The last producer was asked to stop and is still draining.
    Stopping,
}

enum State<T> {
    NotRunning,
    Running {
        ref_count: usize,
        hot: Arc<HotResource<T>>,
    },
    Stopping {
        hot: Arc<HotResource<T>>,
    },
}

pub(crate) struct Shared<T> {
    source: Resource<T>,
    host: Scope,
    mode: SharingMode,
    state: Mutex<State<T>>,
    next_id: AtomicU64,
}

/// One consumer's attachment to a hot instance; released on drop.
struct Lease<T> {
    shared: Arc<Shared<T>>,
    hot: Arc<HotResource<T>>,
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        self.shared.release(self.hot.id());
    }
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn launch(self: &Arc<Self>) -> Arc<HotResource<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(HotResource::start(&self.host, &self.source, id, move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_hot_done(id);
            }
        }))
    }

    /// Attaches to the running instance, starting one when needed.
    async fn attach(self: &Arc<Self>) -> Lease<T> {
        loop {
            let draining = {
                let mut state = self.state.lock();
                match mem::replace(&mut *state, State::NotRunning) {
                    State::NotRunning => {
                        let hot = self.launch();
                        *state = State::Running {
                            ref_count: 1,
                            hot: Arc::clone(&hot),
                        };
                        return self.lease(hot, 1);
                    }
                    State::Running { hot, .. } if hot.is_done() => {
                        let hot = self.launch();
                        *state = State::Running {
                            ref_count: 1,
                            hot: Arc::clone(&hot),
                        };
                        return self.lease(hot, 1);
                    }
                    State::Running { hot, .. } if hot.is_failed() => {
                        *state = State::Stopping {
                            hot: Arc::clone(&hot),
                        };
                        hot
                    }
                    State::Running { ref_count, hot } => {
                        let ref_count = ref_count + 1;
                        *state = State::Running {
                            ref_count,
                            hot: Arc::clone(&hot),
                        };
                        return self.lease(hot, ref_count);
                    }
                    State::Stopping { hot } if hot.is_done() => {
                        let hot = self.launch();
                        *state = State::Running {
                            ref_count: 1,
                            hot: Arc::clone(&hot),
                        };
                        return self.lease(hot, 1);
                    }
                    State::Stopping { hot } => {
                        *state = State::Stopping {
                            hot: Arc::clone(&hot),
                        };
                        hot
                    }
                }
            };
            draining.finished().await;
        }
    }

    fn lease(self: &Arc<Self>, hot: Arc<HotResource<T>>, ref_count: usize) -> Lease<T> {
        self.host.publish(
            Event::new(EventKind::ConsumerAttached)
                .with_resource(self.source.name_arc())
                .with_ref_count(ref_count),
        );
        Lease {
            shared: Arc::clone(self),
            hot,
        }
    }
}

impl<T> Shared<T> {
    fn release(&self, id: u64) {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::NotRunning) {
            State::Running { ref_count, hot } if hot.id() == id => {
                let left = ref_count.saturating_sub(1);
                self.host.publish(
                    Event::new(EventKind::ConsumerReleased)
                        .with_resource(self.source.name_arc())
                        .with_ref_count(left),
                );

                *state = if left > 0 {
                    State::Running {
                        ref_count: left,
                        hot,
                    }
                } else if hot.is_done() {
                    State::NotRunning
                } else if hot.is_failed() {
                    State::Stopping { hot }
                } else {
                    self.stop_idle(hot)
                };
            }
            other => *state = other,
        }
    }

    /// Applies the idle policy to a hot instance that just lost its last consumer.
    fn stop_idle(&self, hot: Arc<HotResource<T>>) -> State<T> {
        let stop = self.mode.stop_without_consumers();
        match stop {
            StopMode::Nope => return State::Running { ref_count: 0, hot },
            StopMode::Stop => hot.stop(),
            StopMode::Cancel => hot.cancel(),
        }
        self.host.publish(
            Event::new(EventKind::HotStopRequested)
                .with_resource(self.source.name_arc())
                .with_reason(stop.as_reason()),
        );
        State::Stopping { hot }
    }

    fn on_hot_done(&self, id: u64) {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::NotRunning) {
            State::Stopping { hot } if hot.id() == id => {}
            State::Running { ref_count: 0, hot } if hot.id() == id => {}
            other => *state = other,
        }
    }
}

/// A [`Resource`] promoted to a ref-counted singleton on a host scope.
///
/// Obtained from [`Resource::share_in`] or [`Host::share`](crate::Host::share).
/// Cheap to clone; clones share the same state machine.
///
/// # Example
/// ```rust
/// use taskshare::{Resource, Scope, SharingMode, SharingState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), taskshare::ResourceError> {
/// let host = Scope::new();
/// let shared = Resource::from_value(5u32).share_in(&host, SharingMode::Lazy);
/// assert_eq!(shared.state(), SharingState::NotRunning);
///
/// let v = shared.using(&Scope::new(), |v, _| async move { v * 2 }).await?;
/// assert_eq!(v, 10);
/// assert_eq!(shared.state(), SharingState::Running { ref_count: 0 });
///
/// host.cancel();
/// host.join().await;
/// # Ok(())
/// # }
/// ```
pub struct SharedResource<T> {
    inner: Arc<Shared<T>>,
    resource: Resource<T>,
}

impl<T> Clone for SharedResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            resource: self.resource.clone(),
        }
    }
}

impl<T> std::fmt::Debug for SharedResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResource")
            .field("name", &self.resource.name_arc())
            .field("mode", &self.inner.mode)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> SharedResource<T> {
    pub(crate) fn new(source: Resource<T>, host: &Scope, mode: SharingMode) -> Self {
        let name = source.name_arc();
        let inner = Arc::new(Shared {
            source,
            host: host.clone(),
            mode,
            state: Mutex::new(State::NotRunning),
            next_id: AtomicU64::new(0),
        });

        if mode.starts_eagerly() {
            let hot = inner.launch();
            *inner.state.lock() = State::Running { ref_count: 0, hot };
        }

        let attached = Arc::clone(&inner);
        let resource = Resource::new(move |_scope, emitter: Emitter<T>| {
            let shared = Arc::clone(&attached);
            async move {
                let lease = shared.attach().await;
                let value = lease.hot.value().await?;
                let consumed = emitter.emit(value).await;
                drop(lease);
                Ok(consumed)
            }
        })
        .named(name);

        Self { inner, resource }
    }

    /// Runs `body` with the shared value; same contract as [`Resource::using`].
    pub async fn using<R, F, Fut>(&self, scope: &Scope, body: F) -> Result<R, ResourceError>
    where
        F: FnOnce(T, Scope) -> Fut,
        Fut: Future<Output = R>,
    {
        self.resource.using(scope, body).await
    }

    /// Plain [`Resource`] view: each `using` attaches to the shared instance.
    pub fn resource(&self) -> &Resource<T> {
        &self.resource
    }

    /// Consumes the handle, returning the [`Resource`] view.
    pub fn into_resource(self) -> Resource<T> {
        self.resource
    }

    /// Lifetime policy this resource was shared with.
    pub fn mode(&self) -> SharingMode {
        self.inner.mode
    }

    /// Label of the underlying resource.
    pub fn name(&self) -> &str {
        self.resource.name()
    }

    /// Current state of the sharing state machine.
    pub fn state(&self) -> SharingState {
        match &*self.inner.state.lock() {
            State::NotRunning => SharingState::NotRunning,
            State::Running { ref_count, .. } => SharingState::Running {
                ref_count: *ref_count,
            },
            State::Stopping { hot } if hot.is_done() => SharingState::NotRunning,
            State::Stopping { .. } => SharingState::Stopping,
        }
    }

    /// Waits until a stopping producer has been joined (returns at once otherwise).
    pub async fn drained(&self) {
        loop {
            let hot = match &*self.inner.state.lock() {
                State::Stopping { hot } if !hot.is_done() => Arc::clone(hot),
                _ => return,
            };
            hot.finished().await;
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
    /// Promotes this resource to a shared singleton whose producers run on `host`.
    ///
    /// `host` must outlive every `using` call on the returned resource. A clone of
    /// `host` is kept by the shared state, so a child scope passed here stays open
    /// (and keeps its ancestors' `join` pending) while the handle is alive.
    pub fn share_in(self, host: &Scope, mode: SharingMode) -> SharedResource<T> {
        SharedResource::new(self, host, mode)
    }
}
