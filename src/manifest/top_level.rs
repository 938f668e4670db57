//! Rewriting for top-level (master) manifests.
//!
//! Every `URI="..."` attribute is pointed back at this proxy's
//! `manifestproxy` endpoint, carrying the sub-manifest location as
//! `playbackUrl` and the caller's token as `token`.

use crate::{
    error::Result,
    fetch::ManifestSource,
    manifest::encoding::encode_component,
    validation::{parse_origin_url, require_non_empty},
};
use tracing::{error, info};
use url::Url;

const URI_ATTRIBUTE: &str = "URI=\"";

/// Sibling file that sub-manifest references are resolved against. Origins
/// that do not publish their renditions next to a `manifest.msi` produce
/// wrong `playbackUrl`s; the rule is kept as the origin convention.
pub const SUB_MANIFEST_FILE: &str = "manifest.msi";

/// Fetch the top-level manifest at `top_level_manifest_url` and rewrite its
/// sub-manifest references to route through `proxy_base_url` with `token`.
///
/// # Errors
/// - [`crate::error::ProxyError::InvalidArgument`] for empty inputs or a
///   non-absolute manifest URL, before any network traffic.
/// - [`crate::error::ProxyError::FetchError`] when the origin fetch fails.
pub async fn fetch_and_rewrite(
    source: &dyn ManifestSource,
    proxy_base_url: &str,
    top_level_manifest_url: &str,
    token: &str,
) -> Result<String> {
    let proxy_base_url = require_non_empty("proxyBaseUrl", Some(proxy_base_url))?;
    let token = require_non_empty("token", Some(token))?;
    let manifest_url = parse_origin_url(top_level_manifest_url)?;

    info!(
        token_present = true,
        token_len = token.len(),
        "Fetching top-level manifest {} for proxy {}",
        top_level_manifest_url,
        proxy_base_url
    );

    let content = source
        .fetch_text(top_level_manifest_url)
        .await
        .inspect_err(|e| {
            error!(
                "Failed to retrieve top-level manifest {}: {}",
                top_level_manifest_url, e
            )
        })?;

    let base_url = top_level_manifest_base_url(&manifest_url);
    let rewritten = rewrite_uri_attributes(&content, proxy_base_url, &base_url, token);

    info!("Top-level manifest {} rewritten", top_level_manifest_url);
    Ok(rewritten)
}

/// Scheme, host, explicit port and directory of `url`, followed by
/// `/manifest.msi`.
pub fn top_level_manifest_base_url(url: &Url) -> String {
    let path = url.path();
    let directory = path.rfind('/').map_or("", |i| &path[..i]);
    let host = url.host_str().unwrap_or_default();

    match url.port() {
        Some(port) => format!(
            "{}://{}:{}{}/{}",
            url.scheme(),
            host,
            port,
            directory,
            SUB_MANIFEST_FILE
        ),
        None => format!(
            "{}://{}{}/{}",
            url.scheme(),
            host,
            directory,
            SUB_MANIFEST_FILE
        ),
    }
}

/// Replace every non-empty `URI="<value>"` attribute of `content` with a
/// proxied, tokenized URI. Everything else is copied verbatim.
pub fn rewrite_uri_attributes(
    content: &str,
    proxy_base_url: &str,
    manifest_base_url: &str,
    token: &str,
) -> String {
    let encoded_base = encode_component(manifest_base_url);
    let encoded_token = encode_component(token);

    let mut out = String::with_capacity(content.len() * 2);
    let mut copied = 0;
    let mut from = 0;

    while let Some(start) = content[from..].find(URI_ATTRIBUTE).map(|i| from + i) {
        let value_start = start + URI_ATTRIBUTE.len();
        let Some(len) = content[value_start..].find('"') else {
            break;
        };

        if len == 0 {
            from = value_start;
            continue;
        }

        let value = &content[value_start..value_start + len];
        out.push_str(&content[copied..start]);
        out.push_str(&format!(
            "URI=\"{}?playbackUrl={}/{}&token={}\"",
            proxy_base_url,
            encoded_base,
            encode_component(value),
            encoded_token
        ));

        copied = value_start + len + 1;
        from = copied;
    }

    out.push_str(&content[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PROXY: &str = "http://proxy:80/api/app/manifest/manifestproxy";
    const MANIFEST_URL: &str = "http://origin.example.com/vod/asset.ism/manifest(format=m3u8-aapl)";
    const ENCODED_BASE: &str = "http%3A%2F%2Forigin.example.com%2Fvod%2Fasset.ism%2Fmanifest.msi";

    /// Serves a fixed body and counts calls.
    struct StaticSource {
        body: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn ok(body: &'static str) -> Self {
            Self {
                body: Some(body),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                body: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ManifestSource for StaticSource {
        async fn fetch_text(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .map(str::to_string)
                .ok_or_else(|| ProxyError::InternalError("origin down".to_string()))
        }
    }

    #[tokio::test]
    async fn rewrites_uri_attribute_to_proxy() {
        let source = StaticSource::ok(
            "#EXTM3U\n\
             #EXT-X-MEDIA:TYPE=AUDIO,URI=\"http://origin/a/b.ism/QualityLevels(500)/manifest\"\n",
        );

        let out = fetch_and_rewrite(&source, PROXY, MANIFEST_URL, "abc")
            .await
            .unwrap();

        assert_eq!(
            out,
            format!(
                "#EXTM3U\n#EXT-X-MEDIA:TYPE=AUDIO,URI=\"{PROXY}?playbackUrl={ENCODED_BASE}/\
                 http%3A%2F%2Forigin%2Fa%2Fb.ism%2FQualityLevels%28500%29%2Fmanifest&token=abc\"\n"
            )
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manifest_without_uri_attributes_is_unchanged() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=500000\nQualityLevels(500000)/manifest\n";
        let source = StaticSource::ok(body);

        let out = fetch_and_rewrite(&source, PROXY, MANIFEST_URL, "abc")
            .await
            .unwrap();

        assert_eq!(out, body);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_propagates_without_text() {
        let source = StaticSource::failing();
        let result = fetch_and_rewrite(&source, PROXY, MANIFEST_URL, "abc").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invalid_inputs_never_reach_the_origin() {
        let source = StaticSource::ok("#EXTM3U\n");

        for (proxy, url, token) in [
            ("", MANIFEST_URL, "abc"),
            (PROXY, "", "abc"),
            (PROXY, "/relative/manifest", "abc"),
            (PROXY, MANIFEST_URL, ""),
        ] {
            let err = fetch_and_rewrite(&source, proxy, url, token)
                .await
                .unwrap_err();
            assert!(matches!(err, ProxyError::InvalidArgument(_)));
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn token_with_reserved_characters_is_encoded_once() {
        let out = rewrite_uri_attributes(
            "URI=\"a\",URI=\"b\"",
            PROXY,
            "http://o/manifest.msi",
            "a&b=c d",
        );
        assert_eq!(out.matches("&token=a%26b%3Dc+d\"").count(), 2);
    }

    #[test]
    fn empty_and_unterminated_attributes_are_left_alone() {
        let content = "X:URI=\"\",Y=1\nZ:URI=\"dangling";
        assert_eq!(
            rewrite_uri_attributes(content, PROXY, "http://o/manifest.msi", "abc"),
            content
        );
    }

    #[test]
    fn bytes_around_matches_are_preserved() {
        let content = "#EXTM3U\r\n\
                       #EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=1,URI=\"iframes.m3u8\"\r\n\
                       #EXT-X-ENDLIST";
        let out = rewrite_uri_attributes(content, PROXY, "http://o/manifest.msi", "abc");
        assert!(out.starts_with("#EXTM3U\r\n#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=1,URI=\""));
        assert!(out.ends_with("iframes.m3u8&token=abc\"\r\n#EXT-X-ENDLIST"));
    }

    #[test]
    fn base_url_uses_sibling_manifest_msi() {
        // Sub-manifests are assumed to sit next to manifest.msi in the
        // top-level manifest's directory.
        let url = Url::parse(MANIFEST_URL).unwrap();
        assert_eq!(
            top_level_manifest_base_url(&url),
            "http://origin.example.com/vod/asset.ism/manifest.msi"
        );
    }

    #[test]
    fn base_url_drops_query_and_keeps_explicit_port() {
        let url = Url::parse("https://origin.example.com:8443/live/a.ism/manifest?x=1").unwrap();
        assert_eq!(
            top_level_manifest_base_url(&url),
            "https://origin.example.com:8443/live/a.ism/manifest.msi"
        );

        let url = Url::parse("https://origin.example.com:443/a.ism/manifest").unwrap();
        assert_eq!(
            top_level_manifest_base_url(&url),
            "https://origin.example.com/a.ism/manifest.msi"
        );
    }

    #[test]
    fn base_url_for_root_path_has_empty_directory() {
        let url = Url::parse("http://origin.example.com").unwrap();
        assert_eq!(
            top_level_manifest_base_url(&url),
            "http://origin.example.com/manifest.msi"
        );
    }
}
