//! Link metadata resolution.
//!
//! `resolve` drives the attempt plan in [`profiles::ATTEMPTS`] against one
//! target under a single [`Deadline`], collects field candidates from every
//! document it manages to fetch, and merges them. Callers apply
//! [`fallback::domain_fallback`] when it reports a [`FetchFailure`].

pub mod body;
pub mod deadline;
pub mod encoding;
pub mod fallback;
pub mod fetch;
pub mod fields;
pub mod guard;
pub mod jsonld;
pub mod markup;
pub mod profiles;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{redirect, Client};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::FetchFailure;
use crate::models::ResolvedMetadata;

pub use deadline::Deadline;
pub use fallback::domain_fallback;
use fields::FieldCandidates;
use profiles::{FetchAttempt, HeaderProfile, ATTEMPTS};

const MAX_REDIRECTS: usize = 10;

/// Shared HTTP client. Per-attempt headers are set on each request; the
/// resolution deadline bounds every call, so no client-wide timeout is set.
///
/// With `block_private_addresses`, connections and redirect hops to private
/// addresses are refused (see [`guard`]).
pub fn build_client(block_private_addresses: bool) -> reqwest::Result<Client> {
    let builder = Client::builder().pool_idle_timeout(Duration::from_secs(30));
    let builder = if block_private_addresses {
        builder
            .dns_resolver(Arc::new(guard::PublicOnlyResolver))
            .redirect(guard::redirect_policy(MAX_REDIRECTS))
    } else {
        builder.redirect(redirect::Policy::limited(MAX_REDIRECTS))
    };
    builder.build()
}

/// Resolve `target` using the standard attempt plan.
pub async fn resolve(
    client: &Client,
    config: &ResolverConfig,
    target: &Url,
    deadline: Deadline,
) -> Result<ResolvedMetadata, FetchFailure> {
    resolve_with(client, config, target, ATTEMPTS, deadline).await
}

/// Resolve `target` with an explicit attempt plan, tried in order.
#[tracing::instrument(skip_all, fields(url = %target))]
pub async fn resolve_with(
    client: &Client,
    config: &ResolverConfig,
    target: &Url,
    attempts: &[FetchAttempt],
    deadline: Deadline,
) -> Result<ResolvedMetadata, FetchFailure> {
    let mut harvested: Vec<FieldCandidates> = Vec::new();
    // Profiles that already produced a document with a complete head.
    let mut satisfied: Vec<HeaderProfile> = Vec::new();
    let mut final_failure: Option<FetchFailure> = None;
    let mut range_failure: Option<FetchFailure> = None;

    for &attempt in attempts {
        if satisfied.contains(&attempt.profile) {
            continue;
        }
        if deadline.is_expired() {
            final_failure = Some(FetchFailure::Timeout);
            break;
        }

        tracing::debug!(
            profile = %attempt.profile,
            range = attempt.use_range,
            remaining_ms = deadline.remaining().as_millis() as u64,
            "Starting fetch attempt"
        );

        match fetch::fetch_attempt(client, target, attempt, config, deadline).await {
            Ok(document) => {
                let candidates = FieldCandidates::from_snapshot(&document.snapshot);
                let complete = candidates.is_complete();
                tracing::debug!(
                    profile = %attempt.profile,
                    range = attempt.use_range,
                    complete,
                    meta_tags = document.snapshot.meta_tags.len(),
                    json_ld_nodes = document.snapshot.json_ld_nodes.len(),
                    "Fetch attempt produced a document"
                );
                harvested.push(candidates);
                if complete {
                    break;
                }
                if document.head_complete || !attempt.use_range {
                    satisfied.push(attempt.profile);
                }
            }
            Err(FetchFailure::Timeout) => {
                final_failure = Some(FetchFailure::Timeout);
                break;
            }
            Err(failure @ (FetchFailure::UnsupportedContentType(_) | FetchFailure::PrivateAddress)) => {
                final_failure = Some(failure);
                break;
            }
            Err(failure) if attempt.use_range => {
                tracing::debug!(
                    profile = %attempt.profile,
                    kind = failure.kind(),
                    error = %failure,
                    "Range attempt abandoned"
                );
                range_failure = Some(failure);
            }
            Err(failure @ FetchFailure::Blocked(_)) if attempt.profile == HeaderProfile::Fallback => {
                final_failure = Some(failure);
                break;
            }
            Err(failure) => {
                tracing::debug!(
                    profile = %attempt.profile,
                    kind = failure.kind(),
                    error = %failure,
                    "Fetch attempt failed"
                );
                final_failure = Some(failure);
            }
        }
    }

    if !harvested.is_empty() {
        if let Some(failure) = &final_failure {
            tracing::debug!(kind = failure.kind(), "Resolving from documents captured before failure");
        }
        return Ok(fields::merge(&harvested));
    }

    let failure = final_failure
        .or(range_failure)
        .unwrap_or_else(|| FetchFailure::Network("no fetch attempts were made".into()));
    tracing::info!(kind = failure.kind(), error = %failure, "Resolution failed");
    Err(failure)
}
