//! Caller identity resolution.
//!
//! The caller is taken from the first usable forwarding header, falling back
//! to the transport peer address.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

/// Headers checked for a forwarded client address, in order.
pub const DEFAULT_IDENTITY_HEADERS: [&str; 3] =
    ["X-Forwarded-For", "Proxy-Client-IP", "HTTP_X_FORWARDED_FOR"];

/// Resolves a stable caller identity from request headers.
#[derive(Debug, Clone)]
pub struct CallerResolver {
    headers: Vec<String>,
}

impl Default for CallerResolver {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_HEADERS.iter().map(|h| h.to_string()))
    }
}

impl CallerResolver {
    /// Create a resolver checking `headers` in order.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve the caller from request headers and the peer address.
    ///
    /// Header names match case-insensitively. Empty and `unknown` values are
    /// skipped, and only the first entry of a comma separated list is used.
    /// Returns `None` when nothing identifies the caller.
    pub fn resolve(
        &self,
        headers: &HashMap<String, String>,
        peer: Option<IpAddr>,
    ) -> Option<String> {
        for candidate in &self.headers {
            let value = headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(candidate))
                .map(|(_, value)| value.as_str());

            if let Some(caller) = value.and_then(first_forwarded) {
                return Some(caller.to_string());
            }
        }

        peer.map(|ip| ip.to_string())
    }
}

fn first_forwarded(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
        return None;
    }
    let first = value.split(',').next().unwrap_or(value).trim();
    if first.is_empty() {
        None
    } else {
        Some(first)
    }
}

/// Parse a peer address given either as `ip:port` or as a bare IP.
pub fn parse_peer(addr: &str) -> Option<IpAddr> {
    let addr = addr.trim();
    addr.parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| addr.parse::<IpAddr>())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn peer() -> Option<IpAddr> {
        parse_peer("127.0.0.1:53211")
    }

    #[test]
    fn test_forwarded_for_wins() {
        let resolver = CallerResolver::default();
        let h = headers(&[("X-Forwarded-For", "192.168.0.1")]);
        assert_eq!(resolver.resolve(&h, peer()), Some("192.168.0.1".to_string()));
    }

    #[test]
    fn test_first_entry_of_list() {
        let resolver = CallerResolver::default();
        let h = headers(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1, 10.0.0.2")]);
        assert_eq!(resolver.resolve(&h, peer()), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn test_header_precedence() {
        let resolver = CallerResolver::default();
        let h = headers(&[
            ("HTTP_X_FORWARDED_FOR", "3.3.3.3"),
            ("Proxy-Client-IP", "2.2.2.2"),
        ]);
        assert_eq!(resolver.resolve(&h, peer()), Some("2.2.2.2".to_string()));
    }

    #[test]
    fn test_unknown_and_empty_are_skipped() {
        let resolver = CallerResolver::default();
        let h = headers(&[
            ("X-Forwarded-For", "UNKNOWN"),
            ("Proxy-Client-IP", ""),
            ("HTTP_X_FORWARDED_FOR", "4.4.4.4"),
        ]);
        assert_eq!(resolver.resolve(&h, peer()), Some("4.4.4.4".to_string()));
    }

    #[test]
    fn test_falls_back_to_peer() {
        let resolver = CallerResolver::default();
        assert_eq!(
            resolver.resolve(&HashMap::new(), peer()),
            Some("127.0.0.1".to_string())
        );
        assert_eq!(resolver.resolve(&HashMap::new(), None), None);
    }

    #[test]
    fn test_custom_headers() {
        let resolver = CallerResolver::new(["X-Real-IP"]);
        let h = headers(&[("X-Forwarded-For", "1.1.1.1"), ("x-real-ip", "9.9.9.9")]);
        assert_eq!(resolver.resolve(&h, None), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn test_parse_peer() {
        assert_eq!(parse_peer("10.1.2.3"), "10.1.2.3".parse().ok());
        assert_eq!(parse_peer("[::1]:8080"), "::1".parse().ok());
        assert_eq!(parse_peer("not an address"), None);
        assert_eq!(parse_peer(""), None);
    }
}
