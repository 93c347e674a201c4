//! Multi-key sliding-window rate limiting.
//!
//! - [`clock`]: injectable time source
//! - [`limiter`]: the [`SlidingWindowLimiter`] and its bucket storage

pub mod clock;
pub mod limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateBuckets, SlidingWindowLimiter};

/// Per-user dimension.
pub const DIM_USER: &str = "user";
/// Per-channel dimension.
pub const DIM_CHANNEL: &str = "channel";
/// Per-guild dimension.
pub const DIM_GUILD: &str = "guild";
