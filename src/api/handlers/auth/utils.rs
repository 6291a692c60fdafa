//! Request helpers shared by the auth handlers.

use axum::http::{header::USER_AGENT, HeaderMap};
use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};

/// Extract a client IP for session binding and rate limiting from common
/// proxy headers. Falls back to a fixed marker so binding comparisons
/// stay consistent when no proxy header is present.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| "unknown".to_string(), str::to_string)
}

/// Hash the user agent into a stable fingerprint; the raw string never
/// reaches storage.
pub(crate) fn client_fingerprint(headers: &HeaderMap) -> String {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    Base64UrlUnpadded::encode_string(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_and_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), "1.2.3.4");
    }

    #[test]
    fn real_ip_used_when_no_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), "9.9.9.9");
    }

    #[test]
    fn missing_headers_fall_back_to_marker() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn fingerprint_depends_on_user_agent_only() {
        let mut a = HeaderMap::new();
        a.insert(USER_AGENT, HeaderValue::from_static("browser/1.0"));
        a.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        let mut b = HeaderMap::new();
        b.insert(USER_AGENT, HeaderValue::from_static("browser/1.0"));

        assert_eq!(client_fingerprint(&a), client_fingerprint(&b));
        assert_ne!(client_fingerprint(&a), client_fingerprint(&HeaderMap::new()));
    }
}
