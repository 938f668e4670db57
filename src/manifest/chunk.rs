//! Token injection for quality-level sub-manifests.
//!
//! Sub-manifests served for a single rendition reference their media two
//! ways: absolute parametrized URLs inside double quotes (keys, init
//! sections) and bare `Fragments(<key>=<value>,<key>=<value>)` lines that
//! the player resolves relative to the playlist. The first kind gets the
//! token appended to its query; the second is made absolute against the
//! `.ism` container so the player fetches it from origin directly.

use crate::error::{ProxyError, Result};
use tracing::{debug, error};

const QUALITY_LEVELS: &str = "QualityLevels(";
const FRAGMENTS: &str = "Fragments(";
const ISM: &str = ".ism";

/// Inject `armoured_token` into every parametrized URL of `content` and,
/// when `playback_url` selects a quality level, anchor fragment references
/// to the origin container.
///
/// `armoured_token` must already be percent-encoded.
///
/// # Errors
/// Returns [`ProxyError::TransformError`] when `playback_url` carries a
/// `QualityLevels(N)` segment but no `.ism` container to anchor fragments to.
pub fn inject_token(playback_url: &str, armoured_token: &str, content: &str) -> Result<String> {
    debug!(
        "Injecting token into sub-manifest of {} ({} bytes)",
        playback_url,
        content.len()
    );

    let fragment_prefix = match find_quality_level(playback_url) {
        Some(quality_level) => {
            let base_url = ism_base_url(playback_url).ok_or_else(|| {
                error!(
                    "playbackUrl selects {} but has no {} container: {}",
                    quality_level, ISM, playback_url
                );
                ProxyError::TransformError(format!(
                    "playbackUrl selects {quality_level} but has no {ISM} container"
                ))
            })?;
            Some(format!("{base_url}/{quality_level}/"))
        }
        None => None,
    };

    let rewritten = append_token_to_quoted_urls(content, armoured_token);

    Ok(match fragment_prefix {
        Some(prefix) => prefix_fragments(&rewritten, &prefix),
        None => rewritten,
    })
}

/// Append `&token=<armoured_token>` before the closing quote of every quoted
/// parametrized URL.
fn append_token_to_quoted_urls(content: &str, armoured_token: &str) -> String {
    let suffix = format!("&token={armoured_token}");
    let mut out = String::with_capacity(content.len());
    let mut copied = 0;
    let mut cursor = 0;
    let mut matched = 0usize;

    while let Some(open) = content[cursor..].find('"').map(|i| cursor + i) {
        let body_start = open + 1;
        let Some(close) = content[body_start..].find('"').map(|i| body_start + i) else {
            break;
        };

        if is_parametrized_url(&content[body_start..close]) {
            out.push_str(&content[copied..close]);
            out.push_str(&suffix);
            copied = close;
            cursor = close + 1;
            matched += 1;
        } else {
            // The closing quote may open the next candidate.
            cursor = close;
        }
    }

    out.push_str(&content[copied..]);
    debug!("Appended token to {} quoted URL(s)", matched);
    out
}

/// Absolute http(s) URL with a host and at least one `key=value` query pair.
fn is_parametrized_url(candidate: &str) -> bool {
    let Some(rest) = strip_scheme(candidate) else {
        return false;
    };
    let Some((before_query, query)) = rest.split_once('?') else {
        return false;
    };

    let (authority, path) = match before_query.find('/') {
        Some(i) => before_query.split_at(i),
        None => (before_query, ""),
    };

    if !is_authority(authority) {
        return false;
    }
    if path.contains('#') || path.chars().any(char::is_control) {
        return false;
    }
    if query.contains('#') || query.chars().any(char::is_control) {
        return false;
    }

    query
        .split('&')
        .any(|pair| matches!(pair.split_once('='), Some((key, _)) if !key.is_empty()))
}

fn strip_scheme(candidate: &str) -> Option<&str> {
    ["https://", "http://"].iter().find_map(|scheme| {
        candidate
            .get(..scheme.len())
            .filter(|head| head.eq_ignore_ascii_case(scheme))
            .map(|_| &candidate[scheme.len()..])
    })
}

/// `host` or `host:port`, host made of ASCII letters, digits, `.` and `-`.
fn is_authority(authority: &str) -> bool {
    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };

    let host_ok = !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-');
    let port_ok = port.is_none_or(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));

    host_ok && port_ok
}

/// First `QualityLevels(<digits>)` segment of `playback_url`.
fn find_quality_level(playback_url: &str) -> Option<&str> {
    let bytes = playback_url.as_bytes();
    let mut from = 0;

    while let Some(start) = playback_url[from..].find(QUALITY_LEVELS).map(|i| from + i) {
        let digits_start = start + QUALITY_LEVELS.len();
        let digits = bytes[digits_start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let close = digits_start + digits;

        if digits > 0 && bytes.get(close) == Some(&b')') {
            return Some(&playback_url[start..=close]);
        }
        from = start + 1;
    }

    None
}

/// `playback_url` up to and including the first case-insensitive `.ism`.
fn ism_base_url(playback_url: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `playback_url`.
    let idx = playback_url.to_ascii_lowercase().find(ISM)?;
    Some(&playback_url[..idx + ISM.len()])
}

/// Prefix every `Fragments(<a>,<b>)` token with `prefix`.
fn prefix_fragments(content: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut copied = 0;
    let mut from = 0;
    let mut matched = 0usize;

    while let Some(start) = content[from..].find(FRAGMENTS).map(|i| from + i) {
        match fragment_len(&content[start..]) {
            Some(len) => {
                out.push_str(&content[copied..start]);
                out.push_str(prefix);
                out.push_str(&content[start..start + len]);
                copied = start + len;
                from = copied;
                matched += 1;
            }
            None => from = start + 1,
        }
    }

    out.push_str(&content[copied..]);
    debug!("Anchored {} fragment reference(s)", matched);
    out
}

/// Byte length of the `Fragments(<a>,<b>)` token at the start of `text`.
fn fragment_len(text: &str) -> Option<usize> {
    let args = text.strip_prefix(FRAGMENTS)?.as_bytes();

    let first = args.iter().take_while(|b| is_fragment_byte(**b)).count();
    if first == 0 || args.get(first) != Some(&b',') {
        return None;
    }

    let second_start = first + 1;
    let second = args[second_start..]
        .iter()
        .take_while(|b| is_fragment_byte(**b))
        .count();
    let close = second_start + second;
    if second == 0 || args.get(close) != Some(&b')') {
        return None;
    }

    Some(FRAGMENTS.len() + close + 1)
}

fn is_fragment_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'=' | b'-')
}
