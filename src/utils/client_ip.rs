// src/utils/client_ip.rs

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

/// Best-effort client address: `X-Forwarded-For`, then `X-Real-IP`, then the socket peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl ClientIp {
    pub fn ipv4(&self) -> Option<String> {
        match self.0 {
            Some(IpAddr::V4(ip)) => Some(ip.to_string()),
            Some(IpAddr::V6(ip)) => ip.to_ipv4_mapped().map(|v4| v4.to_string()),
            None => None,
        }
    }

    pub fn ipv6(&self) -> Option<String> {
        match self.0 {
            Some(IpAddr::V6(ip)) if ip.to_ipv4_mapped().is_none() => Some(ip.to_string()),
            _ => None,
        }
    }
}

fn from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded
            .split(',')
            .next()
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
        {
            return Some(ip);
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = from_headers(&parts.headers).or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        });
        Ok(ClientIp(ip))
    }
}
