//! Client identification utilities
//!
//! Functions for reading the client's network address and declared
//! software string from HTTP requests. Every value here is client-controlled
//! or proxy-controlled and must be treated as a hint, never as identity.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;

/// Placeholder address used when no address can be determined
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Maximum User-Agent length kept; longer values are cut at a char boundary
pub const USER_AGENT_MAX_LEN: usize = 512;

/// Identifying attributes of the client behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Client IP address (from X-Forwarded-For or direct connection)
    pub ip: Option<IpAddr>,
    /// Declared User-Agent string
    pub user_agent: String,
}

impl ClientIdentity {
    pub fn new(ip: Option<IpAddr>, user_agent: impl Into<String>) -> Self {
        Self {
            ip,
            user_agent: user_agent.into(),
        }
    }

    pub fn address(&self) -> String {
        address_key(self.ip)
    }
}

/// Address as a stable string key (IPv4-mapped IPv6 folded to IPv4)
pub fn address_key(ip: Option<IpAddr>) -> String {
    match ip {
        Some(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        Some(ip) => ip.to_string(),
        None => UNKNOWN_ADDRESS.to_string(),
    }
}

/// Error when identifying a client
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientIdentityError {
    #[error("Missing required header: {0}")]
    MissingHeader(String),
}

/// Read the User-Agent header
///
/// ## Returns
/// * `Ok(String)` - trimmed, length-capped User-Agent
/// * `Err(ClientIdentityError)` - header missing, empty or not visible ASCII
pub fn extract_user_agent(headers: &HeaderMap) -> Result<String, ClientIdentityError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .ok_or_else(|| ClientIdentityError::MissingHeader("User-Agent".to_string()))?;

    Ok(truncate_chars(user_agent, USER_AGENT_MAX_LEN))
}

/// Identify the client from headers and the connection address
pub fn extract_identity(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_forwarded_for: bool,
) -> Result<ClientIdentity, ClientIdentityError> {
    let user_agent = extract_user_agent(headers)?;
    let ip = extract_client_ip(headers, direct_ip, trust_forwarded_for);
    Ok(ClientIdentity::new(ip, user_agent))
}

/// Extract client IP address from headers
///
/// When `trust_forwarded_for` is set (the server runs behind a reverse
/// proxy) the first X-Forwarded-For entry wins; otherwise only the direct
/// connection address is used.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_forwarded_for: bool,
) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|xff| xff.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    direct_ip
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("  Mozilla/5.0 Test Browser "),
        );

        assert_eq!(
            extract_user_agent(&headers).unwrap(),
            "Mozilla/5.0 Test Browser"
        );
    }

    #[test]
    fn test_extract_user_agent_missing_or_blank() {
        let headers = HeaderMap::new();
        assert!(matches!(
            extract_user_agent(&headers),
            Err(ClientIdentityError::MissingHeader(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("   "));
        assert!(extract_user_agent(&headers).is_err());
    }

    #[test]
    fn test_user_agent_is_capped() {
        let long = "a".repeat(USER_AGENT_MAX_LEN + 100);
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&long).unwrap());
        assert_eq!(extract_user_agent(&headers).unwrap().len(), USER_AGENT_MAX_LEN);
    }

    #[test]
    fn test_extract_client_ip_xff_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        let direct: IpAddr = "127.0.0.1".parse().unwrap();

        let ip = extract_client_ip(&headers, Some(direct), true);
        assert_eq!(ip, Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn test_extract_client_ip_xff_ignored_when_untrusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("192.168.1.1"));
        let direct: IpAddr = "127.0.0.1".parse().unwrap();

        assert_eq!(extract_client_ip(&headers, Some(direct), false), Some(direct));
    }

    #[test]
    fn test_extract_client_ip_bad_xff_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        let direct: IpAddr = "10.1.2.3".parse().unwrap();

        assert_eq!(extract_client_ip(&headers, Some(direct), true), Some(direct));
    }

    #[test]
    fn test_identity_address() {
        let mapped: IpAddr = "::ffff:203.0.113.9".parse().unwrap();
        assert_eq!(ClientIdentity::new(Some(mapped), "ua").address(), "203.0.113.9");
        assert_eq!(ClientIdentity::new(None, "ua").address(), UNKNOWN_ADDRESS);
    }
}
