//! # Event subscribers.
//!
//! ## Architecture
//! ```text
//!   SharedResource / HotResource / Host ── publish(Event) ──► Bus
//!                                                              │
//!                                              Host listener ◄─┘
//!                                                   │
//!                                   ┌───────────────┴──────────────┐
//!                                   ▼                              ▼
//!                             AliveTracker                  SubscriberSet::emit
//!                         (stuck detection)          ┌──────────┼──────────┐
//!                                                    ▼          ▼          ▼
//!                                                LogWriter   Metrics    Custom
//! ```
//!
//! - [`Subscribe`] the trait to implement;
//! - [`SubscriberSet`] per-subscriber queues and workers;
//! - `LogWriter` stdout printer (feature `logging`).

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
