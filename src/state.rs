use std::sync::Arc;

use reqwest::Client;

use crate::config::ResolverConfig;

/// Shared application state passed to all handlers.
/// The HTTP client is pooled across requests; resolver settings are read once
/// at startup rather than from the environment on every request.
#[derive(Clone)]
pub struct AppState {
    pub http_client: Client,
    pub resolver: Arc<ResolverConfig>,
}
