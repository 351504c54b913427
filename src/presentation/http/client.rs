use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::application::error::ServiceError;
use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::error::{ApiError, ApiResult};

/// Caller address and user agent, used for rate limiting and session bookkeeping.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// The address recorded on sessions and audit rows; `None` when unknown.
    pub fn ip_address(&self) -> Option<String> {
        (self.ip != "unknown").then(|| self.ip.clone())
    }
}

pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(ClientInfo {
            ip: client_ip(&parts.headers, peer),
            user_agent,
        })
    }
}

/// Counts one hit for `client` in `scope` and refuses it past `per_minute`.
pub async fn enforce_rate_limit(
    ctx: &AppContext,
    scope: &str,
    client: &ClientInfo,
    per_minute: u32,
) -> ApiResult<()> {
    if ctx
        .rate_limiter()
        .allow(scope, &client.ip, per_minute)
        .await
    {
        return Ok(());
    }
    tracing::warn!(scope, client = %client.ip, per_minute, "rate_limit_exceeded");
    Err(ServiceError::RateLimited(format!("Rate limit exceeded: {per_minute} per minute")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.1:443".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "192.0.2.1");
        assert_eq!(client_ip(&headers, None), "unknown");
    }
}
