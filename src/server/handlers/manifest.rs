use crate::{
    config::Config,
    error::{ProxyError, Result},
    manifest::{encode_component, fetch_and_rewrite, inject_token},
    metrics,
    server::{MANIFEST_PROXY_PATH, state::AppState},
    validation::{parse_origin_url, require_non_empty},
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri, header, uri::Authority},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Instant;
use tracing::info;

const MPEGURL: &str = "application/vnd.apple.mpegurl";

#[derive(Debug, Deserialize)]
pub struct LoadParams {
    #[serde(rename = "playbackUrl")]
    playback_url: Option<String>,
    webtoken: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    #[serde(rename = "playbackUrl")]
    playback_url: Option<String>,
    token: Option<String>,
}

/// Serve a top-level manifest whose sub-manifest references route back
/// through [`manifest_proxy`] carrying the caller's token.
pub async fn manifest_load(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<LoadParams>,
) -> Result<Response> {
    let start = Instant::now();
    let result = load_top_level(&state, &headers, &uri, &params).await;
    observe("manifestload", start, &result);
    result
}

async fn load_top_level(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    params: &LoadParams,
) -> Result<Response> {
    let (Ok(playback_url), Ok(webtoken)) = (
        require_non_empty("playbackUrl", params.playback_url.as_deref()),
        require_non_empty("webtoken", params.webtoken.as_deref()),
    ) else {
        return Err(ProxyError::InvalidArgument(
            "playbackUrl or webtoken cannot be empty".to_string(),
        ));
    };

    // Anything after a raw `&` belongs to the player, not the origin URL.
    let playback_url = playback_url
        .split_once('&')
        .map_or(playback_url, |(head, _)| head);

    let proxy_url = manifest_proxy_url(&state.config, headers, uri)?;
    info!("Loading top-level manifest {} via {}", playback_url, proxy_url);

    let body = fetch_and_rewrite(
        state.manifest_source.as_ref(),
        &proxy_url,
        playback_url,
        webtoken,
    )
    .await?;

    let cache_control = format!("max-age={}", state.config.load_cache_max_age_secs);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, MPEGURL),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::CACHE_CONTROL, cache_control.as_str()),
        ],
        body,
    )
        .into_response())
}

/// Fetch a sub-manifest from origin and inject the token into its URLs.
pub async fn manifest_proxy(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
) -> Result<Response> {
    let start = Instant::now();
    let result = proxy_sub_manifest(&state, &params).await;
    observe("manifestproxy", start, &result);
    result
}

async fn proxy_sub_manifest(state: &AppState, params: &ProxyParams) -> Result<Response> {
    let (Ok(playback_url), Ok(token)) = (
        require_non_empty("playbackUrl", params.playback_url.as_deref()),
        require_non_empty("token", params.token.as_deref()),
    ) else {
        return Err(ProxyError::InvalidArgument(
            "playbackUrl or token cannot be empty".to_string(),
        ));
    };

    parse_origin_url(playback_url)?;
    let armoured_token = encode_component(token);

    info!(token_len = token.len(), "Proxying sub-manifest {}", playback_url);

    let content = state.manifest_source.fetch_text(playback_url).await?;
    let body = inject_token(playback_url, &armoured_token, &content)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, MPEGURL),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Absolute URL of the `manifestproxy` endpoint as clients reach it.
///
/// Uses the configured public base URL when set, otherwise
/// `http://<host>:<port or 80>` from the request's `Host` header (or the
/// request URI authority for HTTP/2).
fn manifest_proxy_url(config: &Config, headers: &HeaderMap, uri: &Uri) -> Result<String> {
    if let Some(base) = &config.public_base_url {
        return Ok(format!("{base}{MANIFEST_PROXY_PATH}"));
    }

    let authority = match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => host
            .parse::<Authority>()
            .map_err(|_| ProxyError::InvalidArgument(format!("Invalid Host header: {host}")))?,
        None => uri
            .authority()
            .cloned()
            .ok_or_else(|| ProxyError::InvalidArgument("Host header is required".to_string()))?,
    };

    Ok(format!(
        "http://{}:{}{}",
        authority.host(),
        authority.port_u16().unwrap_or(80),
        MANIFEST_PROXY_PATH
    ))
}

fn observe(endpoint: &'static str, start: Instant, result: &Result<Response>) {
    let status = match result {
        Ok(response) => response.status(),
        Err(e) => e.status_code(),
    };

    if matches!(result, Err(ProxyError::FetchError(_))) {
        metrics::record_origin_error();
    }
    metrics::record_request(endpoint, status.as_u16());
    metrics::record_duration(endpoint, start);
}
