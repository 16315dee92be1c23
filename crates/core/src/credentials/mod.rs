//! Session credential handling.
//!
//! The service authenticates against media hosts with a browser-exported
//! cookie jar (`cookies.txt`, Netscape format). [`CookieStore`] loads that
//! file once, hands out the cached [`Credential`] to every fetch, and only
//! re-reads the file on an explicit reload or when the optional watcher
//! notices the file changed.
//!
//! # Example
//!
//! ```ignore
//! use grabber_core::credentials::CookieStore;
//!
//! let store = CookieStore::new("cookies.txt");
//! store.load().await?;
//!
//! let credential = store.credential().await?;
//! let header = credential.cookie_header(&url);
//! ```

mod error;
mod netscape;
mod store;
mod types;

pub use error::CredentialError;
pub use netscape::parse_netscape;
pub use store::{spawn_watcher, CookieStore};
pub use types::{Cookie, Credential};
