//! # Subscriber trait
//!
//! `Subscribe` is the extension point for observing shared-resource and host
//! events. Each subscriber is driven by a dedicated worker fed by a bounded
//! queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block the
//!   publisher nor other subscribers.
//! - Each subscriber declares its queue capacity via [`Subscribe::queue_capacity`].
//!   On overflow the event is dropped for that subscriber and
//!   `SubscriberOverflow` is published.
//!
//! ## Example
//! ```rust
//! use taskshare::{Event, EventKind, Subscribe};
//!
//! struct Failures;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Failures {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::HotFailed {
//!             eprintln!("{:?} failed: {:?}", ev.resource, ev.reason);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for overflow/panic events).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
