//! Source URL validation.

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use reqwest::Url;
use std::net::{IpAddr, SocketAddr};
use tracing::warn;

use super::error::FetchError;

/// Redirect hops followed before a fetch gives up.
pub const MAX_REDIRECTS: usize = 10;

/// Parses `raw` as an absolute http(s) URL.
///
/// With `block_private` set, loopback, private, link-local and unspecified
/// addresses are rejected along with `localhost` names.
pub fn validate_source_url(raw: &str, block_private: bool) -> Result<Url, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FetchError::InvalidUrl("URL is empty".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
        _ => return Err(FetchError::InvalidUrl(format!("{} has no host", raw))),
    };

    if block_private && is_private_host(&host) {
        return Err(FetchError::BlockedHost(host));
    }

    Ok(url)
}

fn is_private_host(host: &str) -> bool {
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().is_ok_and(is_private_ip)
}

/// Loopback, private, link-local, unspecified or broadcast addresses.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => {
            ip.is_loopback()
                || ip.is_private()
                || ip.is_link_local()
                || ip.is_unspecified()
                || ip.is_broadcast()
        }
        IpAddr::V6(ip) => {
            let first = ip.segments()[0];
            ip.is_loopback()
                || ip.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
                || ip.to_ipv4_mapped().is_some_and(|v4| {
                    v4.is_loopback() || v4.is_private() || v4.is_link_local()
                })
        }
    }
}

/// Redirect policy that re-validates every hop.
pub fn redirect_policy(block_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(FetchError::InvalidUrl(format!(
                "more than {} redirects",
                MAX_REDIRECTS
            )));
        }
        let checked = validate_source_url(attempt.url().as_str(), block_private);
        match checked {
            Ok(_) => attempt.follow(),
            Err(e) => {
                warn!(target_url = %attempt.url(), error = %e, "Refusing redirect");
                attempt.error(e)
            }
        }
    })
}

/// Resolves `host` and keeps only public addresses.
///
/// Fails with `BlockedHost` when the name only resolves to private addresses.
pub async fn resolve_public(host: &str) -> Result<Vec<SocketAddr>, FetchError> {
    let resolved = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| FetchError::Connection(format!("failed to resolve {}: {}", host, e)))?;

    let (private, public): (Vec<SocketAddr>, Vec<SocketAddr>) =
        resolved.partition(|addr| is_private_ip(addr.ip()));

    if public.is_empty() {
        if private.is_empty() {
            return Err(FetchError::Connection(format!("{} has no addresses", host)));
        }
        return Err(FetchError::BlockedHost(host.to_string()));
    }
    Ok(public)
}

/// DNS resolver that drops private addresses, so a public-looking name
/// cannot reach internal hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs: Addrs = Box::new(resolve_public(&host).await?.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// Finds a guard rejection inside a reqwest error chain.
pub(crate) fn guard_rejection(e: &reqwest::Error) -> Option<FetchError> {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(fetch) = err.downcast_ref::<FetchError>() {
            return Some(match fetch {
                FetchError::BlockedHost(host) => FetchError::BlockedHost(host.clone()),
                FetchError::InvalidUrl(msg) => FetchError::InvalidUrl(msg.clone()),
                other => FetchError::Connection(other.to_string()),
            });
        }
        source = err.source();
    }
    None
}
