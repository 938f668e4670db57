//! HLS / Smooth Streaming manifest proxy.
//!
//! Rewrites top-level manifests so every sub-manifest reference routes back
//! through this proxy with the caller's token, and injects the token into
//! the URLs of the sub-manifests it then proxies.

pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod metrics;
pub mod server;
pub mod validation;
