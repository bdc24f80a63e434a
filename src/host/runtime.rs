//! # Host: owner of the root scope, event wiring and graceful shutdown.
//!
//! ## Architecture
//! ```text
//! HostBuilder::build()
//!   ├─► Bus (broadcast)
//!   ├─► SubscriberSet (one worker per subscriber)
//!   ├─► AliveTracker  (running hot resources by name)
//!   ├─► listener: Bus ──► AliveTracker::update + SubscriberSet::emit
//!   └─► root Scope (carries the bus)
//!
//! host.share(resource, mode)  = resource.share_in(host.scope(), mode)
//!
//! shutdown():
//!   ├─► publish(ShutdownRequested)
//!   ├─► root.cancel()            → every hot resource and every scope below
//!   └─► timeout(grace, root.join()):
//!         ├─ joined   → publish(AllStoppedWithin)
//!         └─ elapsed  → publish(GraceExceeded) + Err(stuck = AliveTracker::snapshot())
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskshare::{Host, HostConfig, Resource, Scope, SharingMode};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = HostConfig {
//!     grace: Duration::from_secs(5),
//!     ..HostConfig::default()
//! };
//! let host = Host::builder(cfg).build();
//!
//! let db = host.share(Resource::from_value("conn").named("db"), SharingMode::Eager);
//! let caller = Scope::new();
//! let len = db.using(&caller, |conn, _| async move { conn.len() }).await?;
//! assert_eq!(len, 4);
//!
//! host.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio_util::sync::DropGuard;

use super::{alive::AliveTracker, builder::HostBuilder, config::HostConfig, shutdown};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::resource::Resource;
use crate::scope::Scope;
use crate::sharing::{SharedResource, SharingMode};

/// Root of a shared-resource runtime.
///
/// Dropping the host stops its event listener; it does not cancel the root
/// scope (call [`shutdown`](Host::shutdown) for that).
pub struct Host {
    cfg: HostConfig,
    bus: Bus,
    scope: Scope,
    alive: Arc<AliveTracker>,
    _listener: DropGuard,
}

impl Host {
    /// Returns a builder for a host with the given configuration.
    pub fn builder(cfg: HostConfig) -> HostBuilder {
        HostBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: HostConfig,
        bus: Bus,
        scope: Scope,
        alive: Arc<AliveTracker>,
        listener: DropGuard,
    ) -> Self {
        Self {
            cfg,
            bus,
            scope,
            alive,
            _listener: listener,
        }
    }

    /// Root scope; hot resources shared through this host run under it.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Event bus of this host.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Configuration the host was built with.
    pub fn config(&self) -> &HostConfig {
        &self.cfg
    }

    /// Shares `resource` on the root scope.
    pub fn share<T>(&self, resource: Resource<T>, mode: SharingMode) -> SharedResource<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        resource.share_in(&self.scope, mode)
    }

    /// Sorted names of shared resources whose producers are running.
    ///
    /// Eventually consistent with the event bus.
    pub async fn alive(&self) -> Vec<String> {
        self.alive.snapshot().await
    }

    /// Cancels the root scope and waits up to `grace` for it to join.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] listing the resources still
    /// running when the grace period ran out.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.scope.cancel();

        let grace = self.cfg.grace;
        match tokio::time::timeout(grace, self.scope.join()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.alive.snapshot().await;
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Waits for a termination signal (SIGINT/SIGTERM/SIGQUIT, Ctrl-C elsewhere),
    /// then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        if let Err(err) = shutdown::wait_for_shutdown_signal().await {
            tracing::warn!(error = %err, "signal registration failed, shutting down");
        }
        self.shutdown().await
    }
}
