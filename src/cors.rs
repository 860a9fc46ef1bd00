use axum::http::{HeaderValue, request::Parts};
use regex::Regex;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::config::AppConfig;

/// Which browser origins get CORS headers. Requests without an `Origin`
/// header (curl, mobile apps) are never blocked.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    preview: Option<Regex>,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>, preview: Option<Regex>) -> Self {
        Self { allowed, preview }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.allowed_origins.clone(),
            config.preview_origin_pattern.clone(),
        )
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == origin)
            || self
                .preview
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(origin))
    }

    pub fn into_layer(self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _parts: &Parts| {
                    let allowed = origin.to_str().is_ok_and(|origin| self.allows(origin));
                    if !allowed {
                        warn!(origin = ?origin, "blocked by CORS");
                    }
                    allowed
                },
            ))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}
