use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the API endpoint.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain http to a public host would send the password in clear text.
    #[error("Insecure API URL: HTTPS required for public host {0}")]
    InsecurePublicHost(String),
    /// The URL has no host component.
    #[error("API URL has no host")]
    MissingHost,
}

/// Validates the TT-RSS API endpoint.
///
/// The password travels in the login request body, so plain `http` is only
/// accepted for hosts that cannot be reached over the public internet:
/// `localhost`, loopback and private/link-local addresses. Everything else must
/// use `https`.
///
/// # Examples
///
/// ```
/// use ttrss_core::util::validate_api_url;
///
/// assert!(validate_api_url("https://rss.example.com/api/").is_ok());
/// assert!(validate_api_url("http://192.168.1.20/tt-rss/api/").is_ok());
/// assert!(validate_api_url("http://rss.example.com/api/").is_err());
/// assert!(validate_api_url("ftp://rss.example.com/").is_err());
/// ```
pub fn validate_api_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_local_host(host) {
                return Err(UrlValidationError::InsecurePublicHost(host.to_owned()));
            }
            tracing::warn!(host = %host, "Using plain HTTP for a local TT-RSS endpoint");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    Ok(url)
}

fn is_local_host(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    match host_for_parse.parse::<IpAddr>() {
        Ok(IpAddr::V4(ipv4)) => ipv4.is_loopback() || ipv4.is_private() || ipv4.is_link_local(),
        Ok(IpAddr::V6(ipv6)) => {
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            ipv6.is_loopback() || is_unique_local || is_link_local
        }
        Err(_) => false,
    }
}
