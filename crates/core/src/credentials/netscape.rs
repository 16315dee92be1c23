//! Netscape cookie-jar parsing.
//!
//! Each cookie line holds seven TAB-separated fields:
//! `domain  include_subdomains  path  secure  expires  name  value`.

use tracing::debug;

use super::types::Cookie;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Parses a Netscape cookie file, skipping comments, blank and malformed lines.
pub fn parse_netscape(content: &str) -> Vec<Cookie> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let cookie = parse_line(line);
            if cookie.is_none() && !is_ignorable(line) {
                debug!(line = idx + 1, "Skipping malformed cookie line");
            }
            cookie
        })
        .collect()
}

fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || (trimmed.starts_with('#') && !trimmed.starts_with(HTTP_ONLY_PREFIX))
}

fn parse_line(line: &str) -> Option<Cookie> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
        Some(rest) => (rest, true),
        None if line.starts_with('#') => return None,
        None => (line, false),
    };

    let fields: Vec<&str> = line.splitn(7, '\t').collect();
    if fields.len() < 7 {
        return None;
    }

    let domain = fields[0].trim();
    let name = fields[5].trim();
    if domain.is_empty() || name.is_empty() {
        return None;
    }

    Some(Cookie {
        domain: domain.to_string(),
        include_subdomains: parse_flag(fields[1]),
        path: fields[2].trim().to_string(),
        secure: parse_flag(fields[3]),
        http_only,
        expires: parse_expiry(fields[4])?,
        name: name.to_string(),
        value: fields[6].to_string(),
    })
}

fn parse_flag(field: &str) -> bool {
    field.trim().eq_ignore_ascii_case("true")
}

/// `Some(None)` is a session cookie; `None` means the field is unparseable.
fn parse_expiry(field: &str) -> Option<Option<i64>> {
    let field = field.trim();
    let secs = match field.parse::<i64>() {
        Ok(secs) => secs,
        Err(_) => field.parse::<f64>().ok()? as i64,
    };
    Some(if secs <= 0 { None } else { Some(secs) })
}
