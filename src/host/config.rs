//! # Host configuration.
//!
//! Provides [`HostConfig`], the settings of a [`Host`](crate::Host).
//!
//! ## Sentinel values
//! - `grace = 0s` → shutdown does not wait for draining producers
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Configuration of a [`Host`](crate::Host).
///
/// ## Field semantics
/// - `grace`: maximum wait for hot resources to stop after the root scope is cancelled
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// On shutdown:
    /// - the root scope is cancelled (every hot resource with it)
    /// - the host waits up to `grace` for the scope to join
    /// - past that, `RuntimeError::GraceExceeded` is returned
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    ///
    /// A listener lagging behind more than `bus_capacity` events skips the oldest ones.
    pub bus_capacity: usize,
}

impl HostConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for HostConfig {
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
        }
    }
}
