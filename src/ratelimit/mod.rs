//! Rate limiting logic and state management.

mod backend;
mod clock;
mod key;
mod limiter;
mod store;
mod sweeper;
mod window;

pub use backend::RateLimiterBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::ClientKey;
pub use limiter::{
    Decision, LimitConfig, LimiterStats, SlidingWindowLimiter, DEFAULT_MAX_REQUESTS,
    DEFAULT_WINDOW_LENGTH,
};
pub use store::WindowStore;
pub use sweeper::{IdleSweeper, MIN_SWEEP_INTERVAL};
pub use window::ClientRateState;
