//! # Resource: a recipe binding a producer task's lifetime to a scoped value.
//!
//! A [`Resource<T>`] holds no state between uses. Every call to
//! [`Resource::using`] starts one fresh execution of the producer and lends its
//! value to one `body`.
//!
//! ## Lifecycle of one `using` call
//! ```text
//! using(scope, body)
//!   ├─► producer_scope = shielded child of scope (own token, joined by scope)
//!   ├─► spawn producer on scope (teardown guard installed before the first await)
//!   ├─► race:
//!   │     ├─ emitter.emit(value)      ─► value
//!   │     ├─ producer ends first      ─► Err(cause) / Err(NeverEmitted)
//!   │     └─ scope cancelled          ─► abort producer, Err(Canceled)
//!   ├─► body(value, scope.child())     (isolated body scope, joined afterwards)
//!   └─► teardown (always, also on panic or drop):
//!         ├─ scope cancelled? cancel producer_scope
//!         ├─ fire termination switch
//!         └─ join producer task
//! ```
//!
//! ## Rules
//! - `Err` from `using` means **production** failed; `body`'s own outcome is returned in `Ok`.
//! - A panic in `body` is re-raised after teardown.
//! - Cancelling `scope` never drops a producer that already handed off its value:
//!   the producer outlives `body` and runs its post-emit cleanup.
//! - Dropping the `using` future fires the termination switch; the producer keeps
//!   draining under `scope`, so `scope.join()` still waits for it.

mod combinators;
mod context;
mod deferred;
mod emitter;

pub use context::Context;
pub use deferred::Deferred;
pub use emitter::{Consumed, Emitter};

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ResourceError, panic_message};
use crate::scope::Scope;

/// Boxed future returned by a producer.
pub type BoxProduceFuture = Pin<Box<dyn Future<Output = Result<Consumed, ResourceError>> + Send>>;

type ProduceFn<T> = dyn Fn(Scope, Emitter<T>) -> BoxProduceFuture + Send + Sync;

/// A recipe for a value backed by a live, cancellable producer task.
///
/// # Example
/// ```rust
/// use taskshare::{Resource, Scope};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), taskshare::ResourceError> {
/// let conn = Resource::new(|_scope, emitter| async move {
///     let conn = String::from("conn#1");   // open
///     let consumed = emitter.emit(conn).await;
///     // close here: the consumer is done
///     Ok(consumed)
/// })
/// .named("conn");
///
/// let scope = Scope::new();
/// let len = conn.using(&scope, |conn, _| async move { conn.len() }).await?;
/// assert_eq!(len, 7);
/// # Ok(())
/// # }
/// ```
pub struct Resource<T> {
    name: Arc<str>,
    produce: Arc<ProduceFn<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            produce: Arc::clone(&self.produce),
        }
    }
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("name", &self.name).finish()
    }
}

impl<T> Resource<T> {
    /// Sets the label used in events and spans.
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Label used in events and spans.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }
}

impl<T: Send + 'static> Resource<T> {
    /// Creates a resource from a producer.
    ///
    /// The producer receives its own child [`Scope`] (for its own background
    /// tasks) and the [`Emitter`] it must call exactly once.
    pub fn new<F, Fut>(produce: F) -> Self
    where
        F: Fn(Scope, Emitter<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Consumed, ResourceError>> + Send + 'static,
    {
        Self {
            name: Arc::from("resource"),
            produce: Arc::new(move |scope: Scope, emitter: Emitter<T>| -> BoxProduceFuture {
                Box::pin(produce(scope, emitter))
            }),
        }
    }

    /// Runs `body` with one freshly produced value.
    ///
    /// The producer is torn down (switch fired, task joined) before this returns,
    /// whatever the outcome of `body`. Returns `Err` only when production
    /// failed before `body` could run.
    ///
    /// Cancelling `scope` after the hand-off cancels the body scope only; once
    /// `body` returns, the producer is stopped and joined as usual.
    pub async fn using<R, F, Fut>(&self, scope: &Scope, body: F) -> Result<R, ResourceError>
    where
        F: FnOnce(T, Scope) -> Fut,
        Fut: Future<Output = R>,
    {
        let abort = CancellationToken::new();
        if scope.is_cancelled() {
            abort.cancel();
        }
        let producer_scope = scope.shielded_child(abort.child_token());
        let shutdown = CancellationToken::new();
        let (tx, mut rx) = oneshot::channel();
        let (ended_tx, mut ended_rx) = oneshot::channel();

        let producer = (self.produce)(producer_scope.clone(), Emitter::new(tx, shutdown.clone()));
        let mut teardown = Teardown {
            shutdown,
            abort: abort.clone(),
            producer: producer_scope.token().clone(),
            task: Some(spawn_producer(scope, producer_scope, abort, producer, ended_tx)),
            handed_off: false,
        };

        let value = tokio::select! {
            biased;
            value = &mut rx => match value {
                Ok(value) => value,
                // Emitter dropped: the producer is gone or going, report its cause.
                Err(_) => {
                    return Err(teardown.release().await.err().unwrap_or(ResourceError::NeverEmitted));
                }
            },
            ended = &mut ended_rx => {
                // The emitter outlives the producer in one of its tasks; those drain under `scope`.
                teardown.abort();
                return Err(ended.unwrap_or(ResourceError::NeverEmitted));
            }
            _ = scope.cancelled() => {
                teardown.abort();
                return Err(teardown.release().await.err().unwrap_or(ResourceError::Canceled));
            }
        };
        teardown.handed_off = true;

        let body_scope = scope.child();
        let cancel_body = body_scope.token().clone().drop_guard();
        let lent = body_scope.clone();
        let outcome = AssertUnwindSafe(async move { body(value, lent).await })
            .catch_unwind()
            .await;
        if outcome.is_err() {
            body_scope.cancel();
        }
        body_scope.join().await;
        cancel_body.disarm();

        if scope.is_cancelled() {
            teardown.producer.cancel();
        }
        if let Err(err) = teardown.release().await {
            tracing::warn!(resource = %self.name, error = %err, "producer failed during teardown");
        }

        match outcome {
            Ok(out) => Ok(out),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
    /// A resource that lends clones of `value` and has nothing to tear down.
    pub fn from_value(value: T) -> Self {
        Resource::new(move |_scope, emitter| {
            let value = value.clone();
            async move { Ok(emitter.emit(value).await) }
        })
    }
}

/// Spawns the producer on `scope`.
///
/// The task is spawned unconditionally: an abort racing the launch still runs
/// the wrapper, which reports `Canceled` without polling the producer. `ended`
/// carries the outcome as soon as the producer returns, before its own tasks
/// are joined.
fn spawn_producer(
    scope: &Scope,
    producer_scope: Scope,
    abort: CancellationToken,
    producer: BoxProduceFuture,
    ended: oneshot::Sender<ResourceError>,
) -> JoinHandle<Result<Consumed, ResourceError>> {
    scope.spawn(async move {
        let res = tokio::select! {
            biased;
            _ = abort.cancelled() => Err(ResourceError::Canceled),
            res = AssertUnwindSafe(producer).catch_unwind() => res.unwrap_or_else(|panic| {
                Err(ResourceError::Panicked {
                    info: panic_message(panic.as_ref()).into(),
                })
            }),
        };
        let _ = ended.send(match &res {
            Ok(_) => ResourceError::NeverEmitted,
            Err(err) => err.clone(),
        });
        producer_scope.join().await;
        res
    })
}

/// Fires the termination switch and joins the producer.
///
/// Dropped without [`release`](Teardown::release), it still fires the switch
/// (and aborts a producer that has not handed off yet); the producer then
/// drains on its own under the caller's scope.
struct Teardown {
    shutdown: CancellationToken,
    /// Drops the producer future; only used before the hand-off.
    abort: CancellationToken,
    /// Token of the producer scope.
    producer: CancellationToken,
    task: Option<JoinHandle<Result<Consumed, ResourceError>>>,
    handed_off: bool,
}

impl Teardown {
    fn abort(&self) {
        self.abort.cancel();
        self.shutdown.cancel();
    }

    async fn release(mut self) -> Result<Consumed, ResourceError> {
        self.shutdown.cancel();
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| Err(ResourceError::from_join(e))),
            None => Err(ResourceError::NeverEmitted),
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.shutdown.cancel();
            if !self.handed_off {
                self.abort.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Producer that records whether it reached its cleanup.
    fn tracked(cleaned: Arc<AtomicBool>) -> Resource<u32> {
        Resource::new(move |_scope, emitter| {
            let cleaned = cleaned.clone();
            async move {
                let consumed = emitter.emit(42).await;
                cleaned.store(true, Ordering::SeqCst);
                Ok(consumed)
            }
        })
    }

    #[tokio::test]
    async fn body_sees_value_and_producer_is_torn_down() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let scope = Scope::new();

        let out = tracked(cleaned.clone())
            .using(&scope, |v, _| async move { v + 1 })
            .await
            .unwrap();

        assert_eq!(out, 43);
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn each_use_is_an_independent_execution() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let res = Resource::new(move |_scope, emitter| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(emitter.emit(n).await) }
        });

        let scope = Scope::new();
        assert_eq!(res.using(&scope, |v, _| async move { v }).await.unwrap(), 0);
        assert_eq!(res.using(&scope, |v, _| async move { v }).await.unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn producer_failure_reaches_caller() {
        let res: Resource<u32> =
            Resource::new(|_scope, _emitter| async move { Err(ResourceError::failed("refused")) });
        let err = res
            .using(&Scope::new(), |_, _| async { unreachable!("body must not run") })
            .await
            .unwrap_err();
        assert_eq!(err, ResourceError::failed("refused"));
    }

    #[tokio::test]
    async fn proof_from_another_emitter_is_never_emitted() {
        let inner = Resource::from_value(1u32);
        let res: Resource<u32> = Resource::new(move |scope, emitter| {
            let inner = inner.clone();
            async move {
                drop(emitter);
                inner.using(&scope, |v, _| {
                    let (tx, _rx) = oneshot::channel();
                    let shutdown = CancellationToken::new();
                    shutdown.cancel();
                    Emitter::new(tx, shutdown).emit(v)
                })
                .await
            }
        });

        let err = res.using(&Scope::new(), |v, _| async move { v }).await.unwrap_err();
        assert_eq!(err, ResourceError::NeverEmitted);
    }

    #[tokio::test]
    async fn producer_panic_is_reported() {
        let res = Resource::new(|_scope, emitter: Emitter<u32>| async move {
            if emitter.is_released() {
                return Ok(emitter.emit(0).await);
            }
            panic!("producer exploded");
        });
        let err = res.using(&Scope::new(), |v, _| async move { v }).await.unwrap_err();
        assert_eq!(
            err,
            ResourceError::Panicked {
                info: "producer exploded".into()
            }
        );
    }

    #[tokio::test]
    async fn consumer_failure_is_returned_untouched() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let out: Result<Result<u32, &str>, ResourceError> = tracked(cleaned.clone())
            .using(&Scope::new(), |_, _| async { Err("consumer broke") })
            .await;

        assert_eq!(out, Ok(Err("consumer broke")));
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn body_panic_is_reraised_after_teardown() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let res = tracked(cleaned.clone());

        let joined = tokio::spawn(async move {
            res.using(&Scope::new(), |_, _| async { panic!("body exploded") })
                .await
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_use_still_releases_and_drains_under_scope() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let res = tracked(cleaned.clone());
        let scope = Scope::new();

        let pending = res.using(&scope, |_, _| std::future::pending::<()>());
        let timed = tokio::time::timeout(Duration::from_secs(1), pending).await;
        assert!(timed.is_err());

        scope.join().await;
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_scope_prevents_production() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let res = Resource::new(move |_scope, emitter| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(emitter.emit(1u32).await)
            }
        });

        let scope = Scope::new();
        scope.cancel();
        let err = res.using(&scope, |v, _| async move { v }).await.unwrap_err();

        assert_eq!(err, ResourceError::Canceled);
        assert!(!started.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn body_scope_children_are_joined_before_return() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        Resource::from_value(())
            .using(&Scope::new(), |_, body_scope| async move {
                body_scope.spawn(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    flag.store(true, Ordering::SeqCst);
                });
            })
            .await
            .unwrap();

        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_caller_keeps_producer_until_body_returns() {
        let live = Arc::new(AtomicBool::new(false));
        let forced = Arc::new(AtomicBool::new(false));
        let res = {
            let (live, forced) = (live.clone(), forced.clone());
            Resource::new(move |scope: Scope, emitter: Emitter<u32>| {
                let (live, forced) = (live.clone(), forced.clone());
                async move {
                    live.store(true, Ordering::SeqCst);
                    let consumed = emitter.emit(5).await;
                    forced.store(scope.is_cancelled(), Ordering::SeqCst);
                    live.store(false, Ordering::SeqCst);
                    Ok(consumed)
                }
            })
        };

        let caller = Scope::new();
        let body = {
            let (caller, live) = (caller.clone(), live.clone());
            move |v: u32, body_scope: Scope| async move {
                caller.cancel();
                assert!(body_scope.is_cancelled());
                tokio::time::sleep(Duration::from_millis(10)).await;
                (v, live.load(Ordering::SeqCst))
            }
        };
        let out = res.using(&caller, body).await.unwrap();

        assert_eq!(out, (5, true));
        assert!(!live.load(Ordering::SeqCst));
        assert!(forced.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancel_before_hand_off_aborts_producer() {
        let res: Resource<u32> = Resource::new(|_scope, emitter| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(emitter.emit(1).await)
        });

        let caller = Scope::new();
        let canceller = caller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let began = tokio::time::Instant::now();
        let err = res.using(&caller, |v, _| async move { v }).await.unwrap_err();
        assert_eq!(err, ResourceError::Canceled);
        assert!(began.elapsed() < Duration::from_secs(60));
        caller.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported_while_a_producer_task_holds_the_emitter() {
        let res: Resource<u32> = Resource::new(|scope: Scope, emitter: Emitter<u32>| async move {
            let holder = scope.clone();
            scope.spawn(async move {
                let _emitter = emitter;
                holder.cancelled().await;
            });
            Err(ResourceError::failed("refused"))
        });

        let caller = Scope::new();
        let err = tokio::time::timeout(
            Duration::from_secs(10),
            res.using(&caller, |v, _| async move { v }),
        )
        .await
        .expect("failure must not wait for the emitter")
        .unwrap_err();

        assert_eq!(err, ResourceError::failed("refused"));
        caller.join().await;
    }
}
