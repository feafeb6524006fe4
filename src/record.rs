//! The immutable `RequestRecord` produced by the parser and carried by a
//! pending request through to release or drop.

use std::collections::HashMap;
use std::fmt;

/// Protocol classification attached to a request for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Https => write!(f, "HTTPS"),
        }
    }
}

/// The peer address of an accepted client, attached to display events only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr {
    pub ip: std::net::IpAddr,
    pub port: u16,
}

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl From<std::net::SocketAddr> for ClientAddr {
    fn from(addr: std::net::SocketAddr) -> Self {
        ClientAddr {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

/// An immutable value describing a parsed client request at the moment of
/// interception.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// Uppercase ASCII request method, e.g. `GET` or `CONNECT`.
    pub method: String,
    /// Request-target as it appeared on the wire: origin-form for HTTP,
    /// `host:port` authority for CONNECT.
    pub target: String,
    /// Resolved upstream host.
    pub host: String,
    /// Resolved upstream port.
    pub port: u16,
    /// Lowercased header name -> last value.
    pub headers: HashMap<String, String>,
    /// The exact bytes received up to and including the header terminator,
    /// replayed verbatim upstream.
    pub raw_head: Vec<u8>,
}

impl RequestRecord {
    pub fn is_tls_tunnel(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    pub fn protocol(&self) -> Protocol {
        if self.is_tls_tunnel() {
            Protocol::Https
        } else {
            Protocol::Http
        }
    }

    /// Headers selected for display, per the external interface contract:
    /// `user-agent`, `content-type`, `content-length`, `cookie`, `authorization`.
    pub fn selected_headers(&self) -> Vec<(&'static str, String)> {
        const SELECTED: &[&str] = &[
            "user-agent",
            "content-type",
            "content-length",
            "cookie",
            "authorization",
        ];
        SELECTED
            .iter()
            .filter_map(|name| self.headers.get(*name).map(|v| (*name, truncate(v, 60))))
            .collect()
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let truncated: String = value.chars().take(max).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(method: &str) -> RequestRecord {
        RequestRecord {
            method: method.to_string(),
            target: "/hello".to_string(),
            host: "example.test".to_string(),
            port: 8080,
            headers: HashMap::new(),
            raw_head: Vec::new(),
        }
    }

    #[test]
    fn connect_is_tls_tunnel() {
        assert!(record("CONNECT").is_tls_tunnel());
        assert_eq!(record("CONNECT").protocol(), Protocol::Https);
    }

    #[test]
    fn get_is_not_tls_tunnel() {
        assert!(!record("GET").is_tls_tunnel());
        assert_eq!(record("GET").protocol(), Protocol::Http);
    }

    #[test]
    fn selected_headers_truncates_long_values() {
        let mut r = record("GET");
        r.headers.insert("cookie".to_string(), "a".repeat(120));
        let selected = r.selected_headers();
        let (_, value) = selected.iter().find(|(k, _)| *k == "cookie").unwrap();
        assert_eq!(value.len(), 63);
        assert!(value.ends_with("..."));
    }

    #[test]
    fn selected_headers_ignores_unlisted_names() {
        let mut r = record("GET");
        r.headers.insert("x-custom".to_string(), "value".to_string());
        assert!(r.selected_headers().is_empty());
    }
}
