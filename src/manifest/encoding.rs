//! Percent-encoding shared by both manifest dialects.
//!
//! Uses `application/x-www-form-urlencoded` serialization, the same
//! convention axum's `Query` extractor decodes with, so values embedded in
//! rewritten URLs come back byte-for-byte when the player calls us again.

use url::form_urlencoded;

/// Percent-encode a value for use inside a query component.
///
/// ASCII alphanumerics and `*-._` pass through, space becomes `+`,
/// everything else is `%XX`-escaped per UTF-8 byte.
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Inverse of [`encode_component`]. Raw `&` and `=` are kept as-is.
#[cfg(test)]
pub(crate) fn decode_component(value: &str) -> String {
    percent_encoding::percent_decode_str(&value.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}
