//! Credential data types.

use chrono::{DateTime, Utc};
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;

/// A single cookie from the jar.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Domain as written in the jar (may start with `.`).
    pub domain: String,
    /// Whether subdomains of `domain` also receive the cookie.
    pub include_subdomains: bool,
    pub path: String,
    /// Only sent over https.
    pub secure: bool,
    pub http_only: bool,
    /// Unix expiry in seconds; `None` for session cookies.
    pub expires: Option<i64>,
    pub name: String,
    pub value: String,
}

impl Cookie {
    /// Whether this cookie should be sent to `url` at time `now` (unix seconds).
    pub fn matches(&self, url: &Url, now: i64) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        self.domain_matches(&host.to_ascii_lowercase()) && self.path_matches(url.path())
    }

    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires, Some(expiry) if expiry <= now)
    }

    fn domain_matches(&self, host: &str) -> bool {
        let domain = self.domain.to_ascii_lowercase();
        let bare = domain.trim_start_matches('.');
        if host == bare {
            return true;
        }
        let wildcard = self.include_subdomains || domain.starts_with('.');
        wildcard && host.len() > bare.len() && host.ends_with(bare) && {
            let boundary = host.len() - bare.len() - 1;
            host.as_bytes()[boundary] == b'.'
        }
    }

    fn path_matches(&self, request_path: &str) -> bool {
        if self.path.is_empty() || self.path == "/" {
            return true;
        }
        if request_path == self.path {
            return true;
        }
        request_path.starts_with(&self.path)
            && (self.path.ends_with('/')
                || request_path.as_bytes().get(self.path.len()) == Some(&b'/'))
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// One loaded version of the session credential.
///
/// Immutable once built; a reload produces a new `Credential` with a higher
/// `version` rather than mutating this one.
#[derive(Clone)]
pub struct Credential {
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
    pub source: PathBuf,
    pub cookies: Vec<Cookie>,
}

impl Credential {
    /// Number of cookies in this credential.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Renders the `Cookie` header value for a request to `url`.
    ///
    /// Returns `None` when no cookie applies to the target.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookie_header_at(url, Utc::now().timestamp())
    }

    pub(crate) fn cookie_header_at(&self, url: &Url, now: i64) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.matches(url, now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("version", &self.version)
            .field("loaded_at", &self.loaded_at)
            .field("source", &self.source)
            .field("cookies", &self.cookies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(domain: &str, path: &str, secure: bool, expires: Option<i64>) -> Cookie {
        Cookie {
            domain: domain.to_string(),
            include_subdomains: domain.starts_with('.'),
            path: path.to_string(),
            secure,
            http_only: false,
            expires,
            name: "SID".to_string(),
            value: "secret".to_string(),
        }
    }

    fn credential(cookies: Vec<Cookie>) -> Credential {
        Credential {
            version: 1,
            loaded_at: Utc::now(),
            source: PathBuf::from("cookies.txt"),
            cookies,
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_domain_wildcard_matches_subdomain() {
        let c = cookie(".example.com", "/", false, None);
        assert!(c.matches(&url("https://www.example.com/watch"), 0));
        assert!(c.matches(&url("https://example.com/"), 0));
        assert!(!c.matches(&url("https://badexample.com/"), 0));
    }

    #[test]
    fn test_exact_domain_does_not_match_subdomain() {
        let c = cookie("example.com", "/", false, None);
        assert!(c.matches(&url("http://example.com/a"), 0));
        assert!(!c.matches(&url("http://cdn.example.com/a"), 0));
    }

    #[test]
    fn test_secure_cookie_requires_https() {
        let c = cookie(".example.com", "/", true, None);
        assert!(!c.matches(&url("http://example.com/"), 0));
        assert!(c.matches(&url("https://example.com/"), 0));
    }

    #[test]
    fn test_path_prefix() {
        let c = cookie(".example.com", "/media", false, None);
        assert!(c.matches(&url("http://example.com/media"), 0));
        assert!(c.matches(&url("http://example.com/media/clip.mp4"), 0));
        assert!(!c.matches(&url("http://example.com/mediafiles"), 0));
        assert!(!c.matches(&url("http://example.com/"), 0));
    }

    #[test]
    fn test_expired_cookie_skipped() {
        let c = cookie(".example.com", "/", false, Some(1_000));
        assert!(c.matches(&url("http://example.com/"), 999));
        assert!(!c.matches(&url("http://example.com/"), 1_000));
    }

    #[test]
    fn test_cookie_header_joins_matching() {
        let mut other = cookie(".example.com", "/", false, None);
        other.name = "PREF".to_string();
        other.value = "f1=1".to_string();
        let foreign = cookie(".other.org", "/", false, None);

        let cred = credential(vec![cookie(".example.com", "/", false, None), other, foreign]);
        let header = cred.cookie_header_at(&url("https://www.example.com/"), 0);
        assert_eq!(header.as_deref(), Some("SID=secret; PREF=f1=1"));

        assert!(cred
            .cookie_header_at(&url("https://unrelated.net/"), 0)
            .is_none());
    }

    #[test]
    fn test_debug_redacts_values() {
        let cred = credential(vec![cookie(".example.com", "/", false, None)]);
        let rendered = format!("{:?} {:?}", cred, cred.cookies[0]);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
