//! # taskshare
//!
//! **Taskshare** exposes values backed by live, cancellable task trees.
//!
//! A [`Resource<T>`] is a recipe: each [`Resource::using`] call starts one
//! producer task, lends its value to a consumer body, and tears the producer
//! down (termination switch fired, task joined) before returning. A resource can
//! be promoted into a ref-counted, restartable singleton with
//! [`Resource::share_in`], governed by a [`SharingMode`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Resource<T> ──► map / flat_map / catch / deferred / on_context / traced
//!        │
//!        └──► share_in(host scope, SharingMode) ──► SharedResource<T>
//!                                                     │  (mutex-guarded state machine)
//!                                                     ▼
//!                                               HotResource (≤ 1 running)
//!                                                     │
//! ┌───────────────────────────────────────────────────┴───────────────┐
//! │  Host                                                             │
//! │  - root Scope (every hot resource runs under it)                  │
//! │  - Bus (broadcast events)                                         │
//! │  - AliveTracker (running hot resources, stuck detection)          │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//!                        ┌────────────────┐
//!                        │ host listener  │
//!                        └───┬────────┬───┘
//!                            ▼        ▼
//!                   AliveTracker   SubscriberSet
//!                                 ┌─────┼─────┐
//!                                 ▼     ▼     ▼
//!                              sub1   sub2   subN
//! ```
//!
//! ### One `using` call
//! ```text
//! using(scope, body)
//!   ├─► spawn producer on scope (child producer scope, teardown guard)
//!   ├─► emitter.emit(value) ─► body(value, body scope) ─► body scope joined
//!   └─► termination switch fired ─► producer drains ─► task joined ─► return
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types / traits                          |
//! |-------------------|------------------------------------------------------------|---------------------------------------------|
//! | **Scopes**        | Explicit structured concurrency: spawn, cancel, join.      | [`Scope`]                                   |
//! | **Resources**     | Producer/consumer hand-off with guaranteed teardown.       | [`Resource`], [`Emitter`], [`Consumed`]     |
//! | **Combinators**   | Transform, nest, recover, defer, re-home resources.        | [`Deferred`], [`Context`]                   |
//! | **Sharing**       | Ref-counted singleton with a lifetime policy.              | [`SharedResource`], [`SharingMode`]         |
//! | **Host**          | Root scope, event wiring, graceful shutdown.               | [`Host`], [`HostConfig`]                    |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics).             | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed production and runtime errors.                       | [`ResourceError`], [`RuntimeError`]         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskshare::{Host, HostConfig, Resource, Scope, SharingMode};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn taskshare::Subscribe>> = vec![Arc::new(taskshare::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn taskshare::Subscribe>> = Vec::new();
//!
//!     let host = Host::builder(HostConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     // One connection, opened on first use and closed when nobody holds it.
//!     let conn = Resource::new(|_scope, emitter| async move {
//!         let conn = String::from("conn#1");
//!         let consumed = emitter.emit(conn).await;
//!         // close the connection here
//!         Ok(consumed)
//!     })
//!     .named("conn");
//!     let shared = host.share(conn, SharingMode::WhileUsed { graceful: true });
//!
//!     let caller = Scope::new();
//!     let len = shared.using(&caller, |conn, _| async move { conn.len() }).await?;
//!     assert_eq!(len, 6);
//!
//!     host.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod error;
mod events;
mod host;
mod resource;
mod scope;
mod sharing;
mod subscribers;

// ---- Public re-exports ----

pub use error::{ResourceError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use host::{Host, HostBuilder, HostConfig};
pub use resource::{BoxProduceFuture, Consumed, Context, Deferred, Emitter, Resource};
pub use scope::Scope;
pub use sharing::{SharedResource, SharingMode, SharingState};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
