use url::Url;

use crate::models::ResolvedMetadata;
use crate::resolver::fields::strip_www;

/// Metadata derived from the target URL alone, for when no document could be
/// fetched. The author is always unknown.
pub fn domain_fallback(target: &Url, favicon_service_url: &str) -> ResolvedMetadata {
    let host = target
        .host_str()
        .map(|h| strip_www(&h.to_ascii_lowercase()).to_string());
    ResolvedMetadata {
        image: Some(favicon_url(target, favicon_service_url)),
        title: host.clone(),
        author: None,
        site_name: host,
        error: None,
    }
}

/// The favicon service URL with the target's origin as `domain_url`.
pub fn favicon_url(target: &Url, favicon_service_url: &str) -> String {
    let origin = target.origin().ascii_serialization();
    let separator = if favicon_service_url.contains('?') {
        '&'
    } else {
        '?'
    };
    format!(
        "{favicon_service_url}{separator}domain_url={}",
        urlencoding::encode(&origin)
    )
}
