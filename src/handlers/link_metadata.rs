use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use url::{Host, Url};

use crate::error::{AppError, AppResult, FetchFailure};
use crate::models::{ResolveLinkQuery, ResolvedMetadata};
use crate::resolver::guard::{is_private_ip, literal_ip};
use crate::resolver::{self, domain_fallback, Deadline};
use crate::state::AppState;

// ── Public helpers ─────────────────────────────────────────────────────────

/// Parse and vet the `url` query parameter. Nothing here touches the network.
pub fn validate_target(raw: Option<&str>, block_private: bool) -> AppResult<Url> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Missing url parameter".into()))?;

    let parsed = Url::parse(raw).map_err(|_| AppError::Validation("Invalid URL".into()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(AppError::Validation(
                "Only http/https URLs are supported".into(),
            ))
        }
    }

    if parsed.host().is_none() {
        return Err(AppError::Validation("URL has no host".into()));
    }

    if block_private && literal_ip(&parsed).is_some_and(is_private_ip) {
        return Err(AppError::Validation(
            "URL resolves to a private or reserved address".into(),
        ));
    }

    Ok(parsed)
}

/// Outcome of resolving the target host before fetching.
enum HostCheck {
    Public,
    Private,
    Failed(FetchFailure),
}

/// SSRF guard: resolve the hostname and check every address it maps to.
async fn check_resolved_host(target: &Url, deadline: Deadline) -> HostCheck {
    let Some(Host::Domain(host)) = target.host() else {
        return HostCheck::Public;
    };
    let port = target.port_or_known_default().unwrap_or(80);

    let addrs = match deadline.run(tokio::net::lookup_host((host, port))).await {
        Err(_) => return HostCheck::Failed(FetchFailure::Timeout),
        Ok(Err(e)) => {
            tracing::warn!(error = ?e, host, "Could not resolve URL host");
            return HostCheck::Failed(FetchFailure::Network(
                "Could not resolve URL host".into(),
            ));
        }
        Ok(Ok(addrs)) => addrs,
    };

    for addr in addrs {
        if is_private_ip(addr.ip()) {
            return HostCheck::Private;
        }
    }
    HostCheck::Public
}

fn degraded(state: &AppState, target: &Url, failure: FetchFailure) -> (StatusCode, Json<ResolvedMetadata>) {
    let payload = domain_fallback(target, &state.resolver.favicon_service_url)
        .with_error(failure.client_message());
    (failure.status_code(), Json(payload))
}

// ── Handler ────────────────────────────────────────────────────────────────

/// GET /resolve-link-metadata?url=<encoded-url>
///
/// Returns best-effort preview fields for the given URL. When no document can
/// be fetched the fields come from the domain alone, alongside an `error`
/// string and a status reflecting why (504 timeout, 502 transport failure,
/// 200 for blocked or non-HTML targets).
pub async fn resolve_link_metadata(
    State(state): State<AppState>,
    query: Result<Query<ResolveLinkQuery>, QueryRejection>,
) -> AppResult<(StatusCode, Json<ResolvedMetadata>)> {
    // The clock starts at request entry and covers DNS plus every attempt.
    let deadline = Deadline::after(state.resolver.timeout);

    let Query(params) =
        query.map_err(|e| AppError::Validation(format!("Invalid query string: {e}")))?;

    let target = validate_target(params.url.as_deref(), state.resolver.block_private_addresses)?;

    if state.resolver.block_private_addresses {
        match check_resolved_host(&target, deadline).await {
            HostCheck::Public => {}
            HostCheck::Private => {
                return Err(AppError::Validation(
                    "URL resolves to a private or reserved address".into(),
                ))
            }
            HostCheck::Failed(failure) => return Ok(degraded(&state, &target, failure)),
        }
    }

    match resolver::resolve(&state.http_client, &state.resolver, &target, deadline).await {
        Ok(metadata) => Ok((StatusCode::OK, Json(metadata))),
        Err(failure) => {
            tracing::warn!(
                kind = failure.kind(),
                error = %failure,
                url = %target,
                "Link metadata resolution degraded to domain fallback"
            );
            Ok(degraded(&state, &target, failure))
        }
    }
}

// ── Unit tests ─────────────────────────────────────────────────────────────
