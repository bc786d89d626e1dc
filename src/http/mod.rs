//! HTTP surface: telemetry routes behind the rate limiting middleware.

mod handlers;
mod key;
mod middleware;
mod server;

pub use handlers::AppState;
pub use key::ClientKeyExtractor;
pub use middleware::{rate_limit_middleware, RateLimitRejection, RateLimitState, RATE_LIMITED_MESSAGE};
pub use server::{router, HttpServer};
