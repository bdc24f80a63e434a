//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [hot-starting] resource="db"
//! [hot-ready] resource="db"
//! [attached] resource="db" consumers=1
//! [released] resource="db" consumers=0
//! [stop-requested] resource="db" mode="graceful"
//! [hot-stopped] resource="db"
//! [shutdown-requested]
//! [all-stopped-within-grace]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let resource = e.resource.as_deref().unwrap_or("unknown");
        match e.kind {
            EventKind::HotStarting => println!("[hot-starting] resource={resource:?}"),
            EventKind::HotReady => println!("[hot-ready] resource={resource:?}"),
            EventKind::HotFailed => {
                println!("[hot-failed] resource={resource:?} err={:?}", e.reason);
            }
            EventKind::HotStopRequested => {
                println!("[stop-requested] resource={resource:?} mode={:?}", e.reason);
            }
            EventKind::HotStopped => println!("[hot-stopped] resource={resource:?}"),
            EventKind::ConsumerAttached => {
                println!("[attached] resource={resource:?} consumers={:?}", e.ref_count);
            }
            EventKind::ConsumerReleased => {
                println!("[released] resource={resource:?} consumers={:?}", e.ref_count);
            }
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::AllStoppedWithin => println!("[all-stopped-within-grace]"),
            EventKind::GraceExceeded => println!("[grace-exceeded] stuck={:?}", e.reason),
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={resource} reason={:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={resource} info={}",
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
