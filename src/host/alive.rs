//! # Tracker of running hot resources.
//!
//! ```text
//! Host listener ──► AliveTracker::update(&Event)
//!                         │
//!                         ▼
//!               HashMap<String, usize>
//!               (name → running instances)
//! ```
//!
//! ## Rules
//! - Only `HotStarting` / `HotStopped` change the running count.
//! - Several shared resources may carry the same name; each instance counts.
//! - A name is forgotten once its last instance stopped.
//! - Reads are **eventually consistent** with the bus.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

/// Thread-safe tracker of running hot resources, fed from the bus.
#[derive(Default)]
pub(crate) struct AliveTracker {
    state: RwLock<HashMap<String, usize>>,
}

impl AliveTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies one event; returns `true` if the running count changed.
    pub(crate) async fn update(&self, ev: &Event) -> bool {
        let Some(name) = ev.resource.as_deref() else {
            return false;
        };
        let starting = match ev.kind {
            EventKind::HotStarting => true,
            EventKind::HotStopped => false,
            _ => return false,
        };

        let mut state = self.state.write().await;
        if starting {
            *state.entry(name.to_string()).or_default() += 1;
            return true;
        }
        let Some(running) = state.get_mut(name) else {
            return false;
        };
        *running -= 1;
        if *running == 0 {
            state.remove(name);
        }
        true
    }

    #[cfg(test)]
    async fn tracked_names(&self) -> usize {
        self.state.read().await.len()
    }

    /// Sorted names of resources with running producers.
    pub(crate) async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .keys()
            .cloned()
            .collect();
        alive.sort_unstable();
        alive
    }
}
