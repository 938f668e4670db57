use crate::error::{ProxyError, Result};
use url::Url;

/// Reject missing or empty required inputs.
///
/// # Errors
/// Returns [`ProxyError::InvalidArgument`] naming the offending input.
pub fn require_non_empty<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ProxyError::InvalidArgument(format!("{name} cannot be empty"))),
    }
}

/// Parse an origin URL that the proxy is about to fetch.
///
/// Accepts only absolute `http://` and `https://` URLs with a host.
///
/// # Errors
/// Returns [`ProxyError::InvalidArgument`] for:
/// - Empty, relative or unparsable URLs
/// - Non-HTTP(S) schemes
/// - URLs without a host
pub fn parse_origin_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| ProxyError::InvalidArgument(format!("Not an absolute URL: {url}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ProxyError::InvalidArgument(format!(
                "Scheme '{scheme}' not allowed, only http/https permitted"
            )));
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ProxyError::InvalidArgument(format!("No host in URL: {url}")));
    }

    Ok(parsed)
}
