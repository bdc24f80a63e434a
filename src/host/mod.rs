//! Host runtime: root scope ownership, event wiring and lifecycle.
//!
//! The public API is [`Host`] (built through [`HostBuilder`]) and its [`HostConfig`].
//!
//! Internal modules:
//! - `alive`: running hot resources by name, fed from the bus (stuck detection);
//! - `builder`: wires bus, subscribers, alive tracker and the root scope;
//! - `runtime`: the [`Host`] itself, graceful shutdown with a grace period;
//! - `shutdown`: cross-platform OS signal handling.

mod alive;
mod builder;
mod config;
mod runtime;
mod shutdown;

pub use builder::HostBuilder;
pub use config::HostConfig;
pub use runtime::Host;
