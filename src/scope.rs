//! # Scope: one node of the structured task tree.
//!
//! A [`Scope`] is passed down explicitly (never thread-local) and gives its holder
//! three structured operations:
//! - **spawn**: run a task that belongs to this scope;
//! - **cancel**: cooperatively cancel this scope and every descendant;
//! - **join**: wait until every task of this scope *and every live child scope* is gone.
//!
//! ## Tree shape
//! ```text
//! root (Scope::new)
//!  ├── token ─────────────► child_token ─────────► child_token
//!  ├── tracker ◄── keep ── child (Scope::child) ◄── keep ── grandchild
//!  │                        └── tracker                       └── tracker
//!  └── tasks                 └── tasks                         └── tasks
//! ```
//!
//! ## Rules
//! - Cancelling a scope cancels all descendants (child cancellation tokens).
//! - A child scope handle, or any task spawned in it, keeps every ancestor's
//!   [`join`](Scope::join) pending (a tracker token per level).
//! - `join` never waits for the scope's own handle: a scope can join itself.
//! - Scopes inherit the event [`Bus`] and the runtime handle of their parent.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

use crate::events::{Bus, Event};

/// Keeps an ancestor chain of trackers non-empty while alive.
struct Keep {
    _token: TaskTrackerToken,
    _parent: Option<Arc<Keep>>,
}

/// Handle to one node of the structured task tree.
///
/// Cheap to clone; clones refer to the same node.
///
/// # Example
/// ```rust
/// use taskshare::Scope;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let root = Scope::new();
/// let child = root.child();
///
/// let worker = child.clone();
/// child.spawn(async move {
///     worker.cancelled().await;
/// });
/// drop(child);
///
/// root.cancel();
/// root.join().await;
/// # }
/// ```
#[derive(Clone)]
pub struct Scope {
    token: CancellationToken,
    tracker: TaskTracker,
    keep: Option<Arc<Keep>>,
    handle: Option<Handle>,
    bus: Option<Bus>,
}

impl Scope {
    /// Creates a new root scope.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            keep: None,
            handle: None,
            bus: None,
        }
    }

    /// Creates a nested scope.
    ///
    /// The child is cancelled with its parent, and keeps the parent's
    /// [`join`](Scope::join) pending for as long as it (or a task spawned in it) is alive.
    pub fn child(&self) -> Scope {
        Scope {
            token: self.token.child_token(),
            tracker: TaskTracker::new(),
            keep: Some(Arc::new(Keep {
                _token: self.tracker.token(),
                _parent: self.keep.clone(),
            })),
            handle: self.handle.clone(),
            bus: self.bus.clone(),
        }
    }

    /// Creates a nested scope cancelled through `token` instead of this scope.
    ///
    /// Like [`child`](Scope::child) it keeps this scope's `join` pending, but
    /// cancelling this scope does not reach it.
    pub(crate) fn shielded_child(&self, token: CancellationToken) -> Scope {
        Scope {
            token,
            ..self.child()
        }
    }

    /// Spawns a task that belongs to this scope.
    ///
    /// Runs on the runtime handle attached through a [`Context`](crate::Context),
    /// or on the current runtime otherwise.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime and no handle is attached.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let keep = self.keep.clone();
        let task = async move {
            let _keep = keep;
            fut.await
        };
        match &self.handle {
            Some(handle) => self.tracker.spawn_on(task, handle),
            None => self.tracker.spawn(task),
        }
    }

    /// Cancels this scope and all its descendants.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once this scope (or an ancestor) was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when this scope is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Cancellation token of this scope.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Number of tasks (and live child scopes) currently tracked by this scope.
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every task spawned in this scope and every child scope has finished.
    pub async fn join(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Event bus inherited from the host, if any.
    pub fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    /// Publishes an event to the inherited bus (no-op without one).
    pub fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }

    /// Attaches an event bus; descendants created afterwards inherit it.
    pub(crate) fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Returns a view of this node that spawns on `handle`.
    pub(crate) fn with_handle(&self, handle: Handle) -> Self {
        let mut scope = self.clone();
        scope.handle = Some(handle);
        scope
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.token.is_cancelled())
            .field("active_tasks", &self.tracker.len())
            .field("root", &self.keep.is_none())
            .finish()
    }
}
