//! # Lifetime policy of a shared resource.
//!
//! A [`SharingMode`] fixes two orthogonal choices when a resource is shared:
//!
//! | Mode                           | Starts            | Last consumer leaves |
//! |--------------------------------|-------------------|----------------------|
//! | `Eager`                        | at `share_in`     | keeps running        |
//! | `Lazy`                         | first `using`     | keeps running        |
//! | `WhileUsed { graceful: true }` | first `using`     | switch fired         |
//! | `WhileUsed { graceful: false }`| first `using`     | cancelled + switch   |

/// Policy governing when a shared resource starts and whether/how it stops when idle.
///
/// Defaults to `WhileUsed { graceful: true }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharingMode {
    /// Start at sharing time, never stop on idle.
    Eager,
    /// Start on first use, never stop on idle.
    Lazy,
    /// Start on first use, stop when the last consumer leaves.
    ///
    /// `graceful = true` only fires the termination switch and lets the
    /// producer finish its cleanup; `false` also cancels the producer's scope.
    WhileUsed {
        /// Graceful or forced stop.
        graceful: bool,
    },
}

impl Default for SharingMode {
    fn default() -> Self {
        SharingMode::WhileUsed { graceful: true }
    }
}

/// What happens to the hot instance when its consumer count drops to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StopMode {
    Nope,
    Stop,
    Cancel,
}

impl StopMode {
    /// Reason attached to `HotStopRequested`.
    pub(crate) fn as_reason(self) -> &'static str {
        match self {
            StopMode::Nope => "none",
            StopMode::Stop => "graceful",
            StopMode::Cancel => "forced",
        }
    }
}

impl SharingMode {
    /// Returns `true` if production starts at sharing time.
    pub fn starts_eagerly(self) -> bool {
        matches!(self, SharingMode::Eager)
    }

    pub(crate) fn stop_without_consumers(self) -> StopMode {
        match self {
            SharingMode::Eager | SharingMode::Lazy => StopMode::Nope,
            SharingMode::WhileUsed { graceful: true } => StopMode::Stop,
            SharingMode::WhileUsed { graceful: false } => StopMode::Cancel,
        }
    }
}
