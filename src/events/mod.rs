//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by shared resources and the host.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SharedResource` (attach/release/stop), `HotResource`
//!   (starting/ready/failed/stopped), `Host` (shutdown), `SubscriberSet` workers
//!   (overflow/panic).
//! - **Consumers**: the host listener, which fans out to `SubscriberSet` and
//!   updates its `AliveTracker`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
