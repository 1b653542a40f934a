use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Identifier used for clients whose address cannot be determined. They all
/// share one rate-limit bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// First parseable address from `X-Forwarded-For`, then `X-Real-IP`, then the
/// socket address. Proxy headers are only read when `trust_proxy_headers` is set.
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(raw) = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
        {
            let first = raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .find_map(|part| part.parse::<IpAddr>().ok());
            if first.is_some() {
                return first;
            }
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    connect_info.map(|addr| addr.ip())
}

pub fn client_identifier(
    headers: &HeaderMap,
    connect_info: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    extract_client_ip(headers, connect_info, trust_proxy_headers)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
