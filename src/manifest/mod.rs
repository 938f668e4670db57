//! Manifest rewriting.
//!
//! Two independent dialects share only the percent-encoding convention:
//! [`top_level`] for master manifests with `URI="..."` attributes, and
//! [`chunk`] for quality-level sub-manifests with quoted query URLs and
//! `Fragments(...)` references.

pub mod chunk;
pub mod encoding;
pub mod top_level;

pub use chunk::inject_token;
pub use encoding::encode_component;
pub use top_level::fetch_and_rewrite;
