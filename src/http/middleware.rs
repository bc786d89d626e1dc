//! Rate limiting middleware for the telemetry router.

use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::key::ClientKeyExtractor;
use crate::ratelimit::{ClientKey, Decision, RateLimiterBackend};

/// Message returned to rate limited clients.
pub const RATE_LIMITED_MESSAGE: &str = "You've reached the rate limit. Please be patient!";

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// State shared by every invocation of [`rate_limit_middleware`].
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<dyn RateLimiterBackend>,
    extractor: ClientKeyExtractor,
}

impl RateLimitState {
    /// Create middleware state around a limiter.
    pub fn new(limiter: Arc<dyn RateLimiterBackend>, extractor: ClientKeyExtractor) -> Self {
        Self { limiter, extractor }
    }
}

/// Evaluate the request against the limiter before running the handler.
///
/// Admitted requests pass through with informational `X-RateLimit-*`
/// headers added to the response. Rejected requests never reach the
/// handler.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let key = state.extractor.extract(&request);

    match state.limiter.check(&key) {
        Decision::Admit {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            headers.insert(X_RATELIMIT_RESET, HeaderValue::from(whole_seconds(reset_after)));
            response
        }
        Decision::Reject { retry_after, .. } => {
            info!(
                client = %key,
                path = %request.uri().path(),
                "Request rate limited"
            );
            RateLimitRejection::new(key, retry_after).into_response()
        }
    }
}

/// Response sent to a client whose request was rejected.
#[derive(Debug, Clone)]
pub struct RateLimitRejection {
    client: ClientKey,
    retry_after: Duration,
}

#[derive(Serialize)]
struct RejectionBody<'a> {
    message: &'static str,
    extra_details: RejectionDetails<'a>,
}

#[derive(Serialize)]
struct RejectionDetails<'a> {
    ip: &'a str,
    time_left: u64,
}

impl RateLimitRejection {
    /// Create a rejection for `client`, who may retry after `retry_after`.
    pub fn new(client: ClientKey, retry_after: Duration) -> Self {
        Self {
            client,
            retry_after,
        }
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let time_left = whole_seconds(self.retry_after);
        debug!(client = %self.client, time_left = time_left, "Sending rate limit rejection");

        let body = RejectionBody {
            message: RATE_LIMITED_MESSAGE,
            extra_details: RejectionDetails {
                ip: self.client.as_str(),
                time_left,
            },
        };

        (
            StatusCode::FORBIDDEN,
            [(header::RETRY_AFTER, HeaderValue::from(time_left))],
            Json(body),
        )
            .into_response()
    }
}

/// Seconds in `duration`, rounded up.
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
