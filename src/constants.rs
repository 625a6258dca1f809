//! Shared constants used across the application.

/// User agent sent with every Discourse API request.
pub const MIRROR_USER_AGENT: &str = concat!("discourse-post-mirror/", env!("CARGO_PKG_VERSION"));

/// Header carrying the Discourse user API key.
pub const API_KEY_HEADER: &str = "User-Api-Key";

/// Header carrying the Discourse username the key belongs to.
pub const API_USERNAME_HEADER: &str = "Api-Username";
