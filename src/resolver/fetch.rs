use reqwest::header::{ACCEPT_ENCODING, CONTENT_TYPE, RANGE};
use reqwest::Client;
use url::Url;

use crate::config::ResolverConfig;
use crate::error::FetchFailure;
use crate::resolver::body::{read_limited, BodyLimits};
use crate::resolver::deadline::Deadline;
use crate::resolver::markup::DocumentSnapshot;
use crate::resolver::profiles::{is_blocked_status, FetchAttempt};

const HTML_MIME_PREFIXES: &[&str] = &["text/html", "application/xhtml+xml"];

/// A document captured by one attempt.
#[derive(Debug)]
pub struct FetchedDocument {
    pub snapshot: DocumentSnapshot,
    /// `</head>` was seen, so head metadata is as complete as it gets.
    pub head_complete: bool,
    pub truncated: bool,
}

/// Run one attempt: request, status and content-type checks, bounded body
/// read, extraction. The connection is released before this returns.
pub async fn fetch_attempt(
    client: &Client,
    target: &Url,
    attempt: FetchAttempt,
    config: &ResolverConfig,
    deadline: Deadline,
) -> Result<FetchedDocument, FetchFailure> {
    let mut request = client
        .get(target.clone())
        .headers(attempt.profile.headers());
    let mut max_bytes = config.max_body_bytes;
    if attempt.use_range {
        let last_byte = config.range_bytes.saturating_sub(1);
        request = request
            .header(RANGE, format!("bytes=0-{last_byte}"))
            .header(ACCEPT_ENCODING, "identity");
        max_bytes = max_bytes.min(config.range_bytes);
    }

    let response = deadline.run(request.send()).await??;
    let status = response.status();
    tracing::debug!(status = status.as_u16(), final_url = %response.url(), "Upstream responded");

    if !status.is_success() {
        let code = status.as_u16();
        return Err(if is_blocked_status(code) {
            FetchFailure::Blocked(code)
        } else {
            FetchFailure::UpstreamStatus(code)
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    // No Content-Type at all is given the benefit of the doubt.
    if let Some(ct) = content_type.as_deref() {
        if !is_html_content_type(ct) {
            return Err(FetchFailure::UnsupportedContentType(mime_essence(ct)));
        }
    }

    let base_url = response.url().clone();
    let limits = BodyLimits {
        max_bytes,
        head_tail_bytes: config.head_tail_bytes,
    };
    let body = read_limited(
        Box::pin(response.bytes_stream()),
        content_type.as_deref(),
        limits,
        deadline,
    )
    .await?;

    tracing::debug!(
        bytes = body.bytes_read,
        encoding = body.encoding.name(),
        truncated = body.truncated,
        head_complete = body.head_complete,
        "Body read"
    );

    if body.text.trim().is_empty() {
        return Err(FetchFailure::EmptyBody);
    }

    Ok(FetchedDocument {
        snapshot: DocumentSnapshot::extract(body.text, base_url),
        head_complete: body.head_complete,
        truncated: body.truncated,
    })
}

/// Prefix match on the MIME essence.
pub fn is_html_content_type(content_type: &str) -> bool {
    let essence = mime_essence(content_type);
    HTML_MIME_PREFIXES.iter().any(|p| essence.starts_with(p))
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
