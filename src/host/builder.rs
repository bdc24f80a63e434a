use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;

use super::{alive::AliveTracker, config::HostConfig, runtime::Host};
use crate::events::Bus;
use crate::scope::Scope;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Host`].
pub struct HostBuilder {
    cfg: HostConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl HostBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: HostConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive shared-resource and host events through dedicated
    /// workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the host.
    ///
    /// Initializes the event bus, subscriber workers, the alive tracker and the
    /// root scope. Must be called inside a tokio runtime.
    pub fn build(self) -> Host {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let alive = Arc::new(AliveTracker::new());
        let listener = CancellationToken::new();

        spawn_listener(&bus, subs, Arc::clone(&alive), listener.clone());

        let scope = Scope::new().with_bus(bus.clone());
        Host::new_internal(self.cfg, bus, scope, alive, listener.drop_guard())
    }
}

/// Forwards bus events to the alive tracker and the subscriber set.
///
/// The receiver is created before returning, so no event published afterwards is missed.
fn spawn_listener(bus: &Bus, subs: SubscriberSet, alive: Arc<AliveTracker>, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => {
                        alive.update(&ev).await;
                        subs.emit(&ev);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "host listener lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        // Deliver whatever was published before the host went away.
        loop {
            match rx.try_recv() {
                Ok(ev) => subs.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        subs.shutdown().await;
    });
}
