//! Client identity extraction for incoming requests.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::{IpAddr, SocketAddr};

use crate::ratelimit::ClientKey;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Derives the rate limit key for a request.
///
/// The key is the connection's remote IP address. When
/// `trust_forwarded_for` is set, the left-most address of a well-formed
/// `X-Forwarded-For` header takes precedence. Requests with no usable
/// address share the [`ClientKey::unknown`] key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientKeyExtractor {
    trust_forwarded_for: bool,
}

impl ClientKeyExtractor {
    /// Create an extractor.
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self {
            trust_forwarded_for,
        }
    }

    /// Key for `request`.
    pub fn extract<B>(&self, request: &Request<B>) -> ClientKey {
        if self.trust_forwarded_for {
            if let Some(ip) = forwarded_ip(request.headers()) {
                return ClientKey::from_ip(ip);
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientKey::from_ip(addr.ip()))
            .unwrap_or_else(ClientKey::unknown)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
