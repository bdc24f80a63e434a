//! # Runtime events emitted by shared resources and the host.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Hot lifecycle events**: a shared resource's backing producer (starting, ready, failed, stopping, stopped)
//! - **Consumer events**: consumers attaching to / releasing a shared resource
//! - **Host events**: shutdown flow and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, resource name,
//! reasons, and the reference count observed at the time of the event.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskshare::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::HotFailed)
//!     .with_resource("db")
//!     .with_reason("boom")
//!     .with_ref_count(2);
//!
//! assert_eq!(ev.kind, EventKind::HotFailed);
//! assert_eq!(ev.resource.as_deref(), Some("db"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! assert_eq!(ev.ref_count, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `resource`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `resource`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Host shutdown requested (explicit call or OS signal).
    ShutdownRequested,

    /// Every hot resource stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some hot resources did not stop in time.
    GraceExceeded,

    // === Hot resource lifecycle ===
    /// A shared resource launched a fresh backing producer.
    ///
    /// Sets:
    /// - `resource`: resource name
    HotStarting,

    /// The backing producer handed off its value.
    ///
    /// Sets:
    /// - `resource`: resource name
    HotReady,

    /// The backing producer failed; every waiter receives the failure.
    ///
    /// Sets:
    /// - `resource`: resource name
    /// - `reason`: failure message
    HotFailed,

    /// The last consumer left and the producer was asked to stop.
    ///
    /// Sets:
    /// - `resource`: resource name
    /// - `reason`: `graceful` or `forced`
    HotStopRequested,

    /// The backing producer task finished and was joined.
    ///
    /// Sets:
    /// - `resource`: resource name
    HotStopped,

    // === Consumers ===
    /// A consumer attached to a shared resource.
    ///
    /// Sets:
    /// - `resource`: resource name
    /// - `ref_count`: consumers attached after this one joined
    ConsumerAttached,

    /// A consumer released a shared resource.
    ///
    /// Sets:
    /// - `resource`: resource name
    /// - `ref_count`: consumers still attached
    ConsumerReleased,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the resource (or subscriber), if applicable.
    pub resource: Option<Arc<str>>,
    /// Human-readable reason (errors, stop mode, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attached consumer count observed with the event.
    pub ref_count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            resource: None,
            reason: None,
            ref_count: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a resource name.
    #[inline]
    pub fn with_resource(mut self, resource: impl Into<Arc<str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attaches a consumer count (saturates at `u32::MAX`).
    #[inline]
    pub fn with_ref_count(mut self, n: usize) -> Self {
        self.ref_count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_resource(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_resource(subscriber)
            .with_reason(info)
    }
}
