//! Resource sharing: promote a [`Resource`](crate::Resource) into a
//! ref-counted singleton with a lifetime policy.
//!
//! - [`SharingMode`] when production starts and how it stops when idle
//! - [`SharedResource`] the state machine handle returned by `share_in`
//! - `HotResource` (internal) the live producer run backing it

mod hot;
mod mode;
mod shared;

pub use mode::SharingMode;
pub use shared::{SharedResource, SharingState};
