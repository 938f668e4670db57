use std::env;
use std::time::Duration;

/// Default `Cache-Control: max-age` for rewritten top-level manifests (3 days).
pub const DEFAULT_LOAD_CACHE_MAX_AGE_SECS: u64 = 259_200;

/// Default origin fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Public scheme+host(+port) clients use to reach this proxy. When unset
    /// the proxy URL is derived from the request's `Host` header.
    pub public_base_url: Option<String>,
    /// Absolute timeout for origin manifest fetches
    pub fetch_timeout_secs: u64,
    /// `max-age` sent with rewritten top-level manifests
    pub load_cache_max_age_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Check if running in dev mode
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let fetch_timeout_secs = env::var("FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

        let load_cache_max_age_secs = env::var("LOAD_CACHE_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_LOAD_CACHE_MAX_AGE_SECS);

        Ok(Config {
            port,
            is_dev,
            public_base_url,
            fetch_timeout_secs,
            load_cache_max_age_secs,
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
