//! # Resource combinators.
//!
//! Every combinator returns a new [`Resource`] whose producer runs a nested
//! [`Resource::using`] on the source and re-emits from inside its body. The
//! source producer's lifetime therefore always strictly contains the derived one.
//!
//! | Combinator | Result | Lifetime change |
//! |---|---|---|
//! | [`map`](Resource::map) | `Resource<U>` | none |
//! | [`flat_map`](Resource::flat_map) | `Resource<U>` | inner resource nested inside the outer body |
//! | [`catch`](Resource::catch) | `Resource<Result<T, ResourceError>>` | none |
//! | [`on_context`](Resource::on_context) | `Resource<T>` | runs under a [`Context`] |
//! | [`deferred`](Resource::deferred) | `Resource<Deferred<T>>` | production decoupled from the body |
//! | [`traced`](Resource::traced) | `Resource<T>` | wrapped in a `tracing` span |

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::ResourceError;
use crate::resource::{Context, Deferred, Emitter, Resource};

impl<T: Send + 'static> Resource<T> {
    /// Applies `f` to the produced value just before it reaches the body.
    ///
    /// # Example
    /// ```rust
    /// use taskshare::{Resource, Scope};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let port = Resource::from_value(8080u16).map(|p| format!("127.0.0.1:{p}"));
    /// let addr = port.using(&Scope::new(), |a, _| async move { a }).await.unwrap();
    /// assert_eq!(addr, "127.0.0.1:8080");
    /// # }
    /// ```
    pub fn map<U, F>(self, f: F) -> Resource<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let name = self.name_arc();
        let f = Arc::new(f);
        Resource::new(move |scope, emitter: Emitter<U>| {
            let source = self.clone();
            let f = Arc::clone(&f);
            async move {
                source
                    .using(&scope, |value, _| emitter.emit((*f)(value)))
                    .await
            }
        })
        .named(name)
    }

    /// Derives a second resource from the produced value and nests its use.
    ///
    /// A failure of either layer fails the composed use.
    pub fn flat_map<U, F>(self, f: F) -> Resource<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Resource<U> + Send + Sync + 'static,
    {
        let name = self.name_arc();
        let f = Arc::new(f);
        Resource::new(move |scope, emitter: Emitter<U>| {
            let source = self.clone();
            let f = Arc::clone(&f);
            async move {
                source
                    .using(&scope, |value, inner_scope| async move {
                        (*f)(value)
                            .using(&inner_scope, |inner, _| emitter.emit(inner))
                            .await
                    })
                    .await?
            }
        })
        .named(name)
    }

    /// Turns production failures into values.
    ///
    /// Only failures raised before the body runs are converted; whatever the
    /// body itself returns or raises passes through untouched.
    pub fn catch(self) -> Resource<Result<T, ResourceError>> {
        let name = self.name_arc();
        Resource::new(move |scope, emitter: Emitter<Result<T, ResourceError>>| {
            let source = self.clone();
            async move {
                let mut slot = Some(emitter);
                let produced = source
                    .using(&scope, |value, _| {
                        let emitter = slot.take();
                        async move {
                            match emitter {
                                Some(emitter) => Ok(emitter.emit(Ok(value)).await),
                                None => Err(ResourceError::NeverEmitted),
                            }
                        }
                    })
                    .await;

                match produced {
                    Ok(inner) => inner,
                    Err(err) => match slot.take() {
                        Some(emitter) => Ok(emitter.emit(Err(err)).await),
                        None => Err(err),
                    },
                }
            }
        })
        .named(name)
    }

    /// Runs every use of this resource under `context`.
    ///
    /// Fails fast with [`ResourceError::InvalidContext`] when the context
    /// carries a [`Scope`](crate::Scope): that would replace the resource's own
    /// task tree and defeat structured cancellation.
    pub fn on_context(self, context: Context) -> Result<Resource<T>, ResourceError> {
        if context.carries_scope() {
            return Err(ResourceError::InvalidContext {
                reason: "a scope would replace the resource's own task tree".into(),
            });
        }

        let name = self.name_arc();
        Ok(Resource::new(move |scope, emitter: Emitter<T>| {
            let source = self.clone();
            let scope = context.apply(&scope);
            let span = context.span();
            async move {
                source
                    .using(&scope, |value, _| emitter.emit(value))
                    .instrument(span)
                    .await
            }
        })
        .named(name))
    }

    /// Wraps every use of this resource in a `tracing` span called `span`.
    pub fn traced(self, span: impl Into<Arc<str>>) -> Resource<T> {
        let name = self.name_arc();
        let label: Arc<str> = span.into();
        Resource::new(move |scope, emitter: Emitter<T>| {
            let source = self.clone();
            let span = tracing::info_span!("resource", span = %label, resource = %source.name());
            async move {
                tracing::debug!("acquiring");
                let res = source
                    .using(&scope, |value, _| async move {
                        tracing::debug!("acquired");
                        emitter.emit(value).await
                    })
                    .await;
                match &res {
                    Ok(_) => tracing::debug!("released"),
                    Err(err) => tracing::debug!(error = %err, "production failed"),
                }
                res
            }
            .instrument(span)
        })
        .named(name)
    }
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
    /// Starts production decoupled from the body.
    ///
    /// The body receives a [`Deferred`] immediately and may overlap unrelated
    /// setup with production. With `lazy = true` production starts on the first
    /// [`Deferred::get`]. When the body ends, production that never finished is
    /// cancelled; a finished one is released through its termination switch.
    ///
    /// # Example
    /// ```rust
    /// use taskshare::{Resource, Scope};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let slow = Resource::from_value(3u8).deferred(false);
    /// let sum = slow
    ///     .using(&Scope::new(), |value, _| async move {
    ///         let setup = 4u8; // overlaps with production
    ///         value.get().await.map(|v| v + setup)
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(sum, Ok(7));
    /// # }
    /// ```
    pub fn deferred(self, lazy: bool) -> Resource<Deferred<T>> {
        let name = self.name_arc();
        Resource::new(move |scope, emitter: Emitter<Deferred<T>>| {
            let source = self.clone();
            async move {
                let production = scope.child();
                let start = CancellationToken::new();
                let release = CancellationToken::new();
                let (tx, rx) = watch::channel(None);
                if !lazy {
                    start.cancel();
                }

                let task = {
                    let production = production.clone();
                    let start = start.clone();
                    let release = release.clone();
                    scope.spawn(async move {
                        let produce = async {
                            start.cancelled().await;
                            let res = source
                                .using(&production, |value, _| {
                                    tx.send_replace(Some(Ok(value)));
                                    release.cancelled()
                                })
                                .await;
                            if let Err(err) = res {
                                tx.send_replace(Some(Err(err)));
                            }
                        };
                        tokio::select! {
                            biased;
                            _ = production.cancelled() => {}
                            _ = produce => {}
                        }
                    })
                };

                let progress = rx.clone();
                let consumed = emitter.emit(Deferred::new(rx, start)).await;

                if progress.borrow().is_some() {
                    release.cancel();
                } else {
                    production.cancel();
                }
                if let Err(err) = task.await {
                    return Err(ResourceError::from_join(err));
                }
                Ok(consumed)
            }
        })
        .named(name)
    }
}
