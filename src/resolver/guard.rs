//! Private-address guard applied below the handler's up-front check.
//!
//! The client built with the guard on resolves hostnames through
//! [`PublicOnlyResolver`], so every connection (redirect hops included, and
//! whatever the name resolves to at connect time) lands on a public address.
//! Literal IP hosts never reach a resolver, so redirects to them are vetted by
//! [`redirect_policy`].

use std::error::Error as StdError;
use std::net::{IpAddr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect;
use thiserror::Error;
use url::{Host, Url};

/// A connection target was refused because it is not a public address.
#[derive(Error, Debug)]
#[error("{host} resolves to a private or reserved address")]
pub struct BlockedAddress {
    pub host: String,
}

#[derive(Error, Debug)]
#[error("too many redirects")]
struct TooManyRedirects;

/// Returns `true` if `ip` is a private, loopback, link-local or unspecified address.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            matches!(
                o,
                [127, ..]
                    | [10, ..]
                    | [169, 254, ..]
                    | [192, 168, ..]
                    | [0, ..]
                    | [255, 255, 255, 255]
            ) || (o[0] == 172 && (16..=31).contains(&o[1]))
                || (o[0] == 100 && (64..=127).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(v4));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00 == 0xfc00)
                || (v6.segments()[0] & 0xffc0 == 0xfe80)
        }
    }
}

/// The IP address of `url`'s host, when the host is an IP literal.
pub fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Domain(_) => None,
        Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
        Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
    }
}

/// Whether `err` (or anything in its source chain) is a [`BlockedAddress`].
pub fn is_blocked_address(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<BlockedAddress>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// DNS resolver that drops every private address from the answer and fails
/// when nothing public is left.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            let public: Vec<SocketAddr> = resolved
                .into_iter()
                .filter(|addr| !is_private_ip(addr.ip()))
                .collect();
            if public.is_empty() {
                tracing::warn!(host, "Refusing connection to private address");
                return Err(Box::new(BlockedAddress { host }) as Box<dyn StdError + Send + Sync>);
            }
            Ok(Box::new(public.into_iter()) as Addrs)
        })
    }
}

/// Follow at most `max` redirects, refusing hops to private IP literals.
pub fn redirect_policy(max: usize) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= max {
            return attempt.error(TooManyRedirects);
        }
        match literal_ip(attempt.url()) {
            Some(ip) if is_private_ip(ip) => {
                let host = ip.to_string();
                tracing::warn!(host, "Refusing redirect to private address");
                attempt.error(BlockedAddress { host })
            }
            _ => attempt.follow(),
        }
    })
}
