pub mod handlers;
pub mod state;

use crate::{config::Config, error::Result};
use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method},
    middleware,
    response::Response,
    routing::get,
};
use state::AppState;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};

/// Path of the sub-manifest proxy endpoint, embedded in rewritten manifests.
pub const MANIFEST_PROXY_PATH: &str = "/api/app/manifest/manifestproxy";
pub const MANIFEST_LOAD_PATH: &str = "/api/app/manifest/manifestload";

/// Build the router with an HTTP-backed [`AppState`].
pub fn build_router(config: Config) -> Result<Router> {
    Ok(router(AppState::new(config)?))
}

/// Build the router around an existing state.
pub fn router(state: AppState) -> Router {
    // Every response, errors included, carries Access-Control-Allow-Origin: *
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::render_metrics))
        .route(MANIFEST_LOAD_PATH, get(handlers::manifest::manifest_load))
        .route(MANIFEST_PROXY_PATH, get(handlers::manifest::manifest_proxy))
        .layer(middleware::map_response(add_version_header))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span carrying the path only. Query strings hold caller tokens.
fn request_span(request: &Request) -> Span {
    info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

async fn add_version_header(mut response: Response) -> Response {
    response.headers_mut().insert(
        HeaderName::from_static("x-hls-proxy-version"),
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Start the Axum HTTP server and serve until `shutdown` is cancelled
pub async fn start(
    config: Config,
    shutdown: CancellationToken,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let state = AppState::new(config)?;
    let _upkeep = crate::metrics::spawn_upkeep(
        state.metrics.clone(),
        crate::metrics::UPKEEP_INTERVAL,
        shutdown.clone(),
    );
    let app = router(state);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}
