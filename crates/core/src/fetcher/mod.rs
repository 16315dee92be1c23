//! Fetcher module for downloading remote media.
//!
//! The [`Fetcher`] trait streams a remote resource into a job's workspace
//! using the session credential's cookies. [`HttpFetcher`] is the `reqwest`
//! implementation.
//!
//! # Guarantees
//!
//! - Downloads are capped at `max_download_bytes`
//! - A stalled transfer fails after `idle_timeout_secs` without progress
//! - Nothing is left on disk when a fetch fails
//! - With `block_private_hosts`, neither the submitted URL, any redirect hop,
//!   nor a resolved address may point at a private network

mod config;
mod error;
mod http;
mod proxy;
mod traits;
mod url_guard;

pub use config::FetcherConfig;
pub use error::FetchError;
pub use http::HttpFetcher;
pub use traits::Fetcher;
pub use proxy::{parse_proxy, ProxyRotator};
pub use url_guard::{is_private_ip, validate_source_url, PublicResolver};
