use std::net::IpAddr;

use thiserror::Error;

/// Maximum accepted URL length. Anything longer is rejected outright.
pub const MAX_URL_LEN: usize = 2048;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlError {
    #[error("URL too long (max {} characters)", MAX_URL_LEN)]
    TooLong,

    #[error("invalid URL: {0}")]
    Invalid(String),

    #[error("URL must use http or https scheme, got {0}")]
    Scheme(String),

    #[error("URLs pointing to internal hosts are not allowed: {0}")]
    BlockedHost(String),

    #[error("URLs pointing to private/loopback addresses are not allowed: {0}")]
    PrivateAddress(String),
}

/// Validate a URL for outbound fetching. Rejects non-http(s) schemes,
/// loopback/private/link-local/metadata targets, and overlong inputs.
/// Returns the normalized href on success.
pub fn validate_url(raw: &str) -> Result<String, UrlError> {
    validate_url_opts(raw, false)
}

/// Same as [`validate_url`] but optionally admits `data:` URLs, for callers
/// that knowingly handle inline payloads.
pub fn validate_url_opts(raw: &str, allow_data: bool) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    if trimmed.len() > MAX_URL_LEN {
        return Err(UrlError::TooLong);
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::Invalid(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        "data" if allow_data => return Ok(parsed.to_string()),
        other => return Err(UrlError::Scheme(other.to_string())),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| UrlError::Invalid("missing host".to_string()))?;

    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        if is_blocked_ip(ip) {
            return Err(UrlError::PrivateAddress(host.to_string()));
        }
    } else {
        let lower = host.to_lowercase();
        if lower == "localhost"
            || lower.ends_with(".local")
            || lower.ends_with(".internal")
            || lower == "metadata.google.internal"
        {
            return Err(UrlError::BlockedHost(host.to_string()));
        }
    }

    Ok(parsed.to_string())
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_https() {
        let href = validate_url("https://news.google.com/rss/search?q=migas").unwrap();
        assert!(href.starts_with("https://news.google.com/"));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(validate_url("ftp://example.com/x"), Err(UrlError::Scheme(_))));
        assert!(matches!(validate_url("data:text/html,hi"), Err(UrlError::Scheme(_))));
        assert!(validate_url_opts("data:text/plain,ok", true).is_ok());
    }

    #[test]
    fn rejects_loopback_and_private() {
        assert!(matches!(validate_url("http://localhost/admin"), Err(UrlError::BlockedHost(_))));
        assert!(matches!(validate_url("http://127.0.0.1/"), Err(UrlError::PrivateAddress(_))));
        assert!(matches!(validate_url("http://0.0.0.0/"), Err(UrlError::PrivateAddress(_))));
        assert!(matches!(validate_url("http://10.1.2.3/"), Err(UrlError::PrivateAddress(_))));
        assert!(matches!(validate_url("http://172.20.0.1/"), Err(UrlError::PrivateAddress(_))));
        assert!(matches!(validate_url("http://192.168.1.1/"), Err(UrlError::PrivateAddress(_))));
        assert!(matches!(validate_url("http://169.254.169.254/meta"), Err(UrlError::PrivateAddress(_))));
        assert!(matches!(validate_url("http://[::1]/"), Err(UrlError::PrivateAddress(_))));
    }

    #[test]
    fn rejects_overlong() {
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert_eq!(validate_url(&long), Err(UrlError::TooLong));
    }

    #[test]
    fn public_172_range_is_allowed() {
        // Only 172.16.0.0/12 is private.
        assert!(validate_url("http://172.32.0.1/").is_ok());
    }
}
