use serde::{Deserialize, Serialize};

/// Link preview fields returned by `GET /resolve-link-metadata`.
///
/// Every field is independently nullable. `error` only appears beside
/// fallback data when the resolution degraded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetadata {
    pub image: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedMetadata {
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveLinkQuery {
    pub url: Option<String>,
}
