use std::net::Ipv6Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use url::form_urlencoded;

/// Schemes for which a `;params` suffix on the last path segment is split off.
const USES_PARAMS: &[&str] = &[
    "", "ftp", "hdl", "prospero", "http", "imap", "https", "shttp", "rtsp", "rtsps", "rtspu", "sip",
    "sips", "mms", "sftp", "tel",
];

static IP_FUTURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\Av[a-fA-F0-9]+\..+\z").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IPv6 authority: {0}")]
    InvalidIpv6(String),
}

/// A URL split into its components. Nothing is validated or canonicalized,
/// except for the scheme, which is lowercased.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: String,
    pub authority: String,
    pub path: String,
    pub params: String,
    pub query: String,
    pub fragment: String,
}

impl ParsedUrl {
    /// Decoded query parameters, grouped by name in order of first appearance.
    /// Blank values are kept.
    pub fn query_params(&self) -> Vec<(String, Vec<String>)> {
        let mut params: Vec<(String, Vec<String>)> = vec![];

        for (name, value) in form_urlencoded::parse(self.query.as_bytes()) {
            if let Some((_, values)) = params.iter_mut().find(|(n, _)| *n == name) {
                values.push(value.into_owned());
            }
            else {
                params.push((name.into_owned(), vec![value.into_owned()]));
            }
        }

        params
    }
}

pub fn split(url: &str) -> Result<ParsedUrl, ParseError> {
    let cleaned: String = url
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect();
    let mut rest = cleaned.as_str();
    let mut parsed = ParsedUrl::default();

    if let Some((scheme, tail)) = rest.split_once(':') {
        if is_scheme(scheme) {
            parsed.scheme = scheme.to_ascii_lowercase();
            rest = tail;
        }
    }

    if let Some(tail) = rest.strip_prefix("//") {
        let end = tail.find(['/', '?', '#']).unwrap_or(tail.len());
        let authority = &tail[..end];
        check_brackets(authority)?;
        parsed.authority = authority.to_owned();
        rest = &tail[end..];
    }

    if let Some((head, fragment)) = rest.split_once('#') {
        parsed.fragment = fragment.to_owned();
        rest = head;
    }

    if let Some((head, query)) = rest.split_once('?') {
        parsed.query = query.to_owned();
        rest = head;
    }

    parsed.path = rest.to_owned();

    if USES_PARAMS.contains(&parsed.scheme.as_str()) {
        let last_segment = parsed.path.rfind('/').map_or(0, |i| i + 1);
        if let Some(i) = parsed.path[last_segment..].find(';') {
            let i = last_segment + i;
            parsed.params = parsed.path[i + 1..].to_owned();
            parsed.path.truncate(i);
        }
    }

    Ok(parsed)
}

/// Returns `true` if the URL has a non-empty query component.
pub fn has_query(url: &str) -> bool {
    split(url).map_or(false, |parsed| !parsed.query.is_empty())
}

/// Rejects unbalanced brackets, and bracketed hosts that are neither an IPv6
/// address (optionally with a zone) nor an `IPvFuture` literal.
fn check_brackets(authority: &str) -> Result<(), ParseError> {
    let invalid = || ParseError::InvalidIpv6(authority.to_owned());

    match (authority.contains('['), authority.contains(']')) {
        (false, false) => return Ok(()),
        (true, true) => {}
        _ => return Err(invalid()),
    }

    let host_and_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let Some(("", bracketed)) = host_and_port.split_once('[')
    else {
        return Err(invalid());
    };
    let Some((host, port)) = bracketed.split_once(']')
    else {
        return Err(invalid());
    };
    if !port.is_empty() && !port.starts_with(':') {
        return Err(invalid());
    }

    let valid = if host.starts_with('v') {
        IP_FUTURE.is_match(host)
    }
    else {
        let address = host.split_once('%').map_or(host, |(address, _)| address);
        address.parse::<Ipv6Addr>().is_ok()
    };

    if valid {
        Ok(())
    }
    else {
        Err(invalid())
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_all_components() {
        let parsed = split("HTTPS://Example.com:8080/a/b;v=1?x=1&y=2#top").unwrap();
        assert_eq!(
            parsed,
            ParsedUrl {
                scheme: "https".to_owned(),
                authority: "Example.com:8080".to_owned(),
                path: "/a/b".to_owned(),
                params: "v=1".to_owned(),
                query: "x=1&y=2".to_owned(),
                fragment: "top".to_owned(),
            }
        );
    }

    #[test]
    fn missing_scheme_and_authority_land_in_path() {
        let parsed = split("example.com/foo?a=1").unwrap();
        assert_eq!(parsed.scheme, "");
        assert_eq!(parsed.authority, "");
        assert_eq!(parsed.path, "example.com/foo");
        assert_eq!(parsed.query, "a=1");
    }

    #[test]
    fn scheme_must_start_with_a_letter() {
        let parsed = split("1http://x.com/").unwrap();
        assert_eq!(parsed.scheme, "");
        assert_eq!(parsed.path, "1http://x.com/");
    }

    #[test]
    fn protocol_relative_url() {
        let parsed = split("//cdn.x.com/lib.js").unwrap();
        assert_eq!(parsed.scheme, "");
        assert_eq!(parsed.authority, "cdn.x.com");
        assert_eq!(parsed.path, "/lib.js");
    }

    #[test]
    fn semicolon_before_last_segment_stays_in_path() {
        let parsed = split("http://x.com/a;b/c").unwrap();
        assert_eq!(parsed.path, "/a;b/c");
        assert_eq!(parsed.params, "");
    }

    #[test]
    fn unbalanced_ipv6_is_an_error() {
        assert!(split("http://[::1/path").is_err());
        assert!(split("http://::1]/path").is_err());
        assert!(split("http://[::1]:80/path").is_ok());
    }

    #[test]
    fn bracketed_host_must_be_an_ipv6_address() {
        assert!(split("http://[abc]/?b=1&a=2").is_err());
        assert!(split("http://[127.0.0.1]/").is_err());
        assert!(split("http://x[::1]/").is_err());
        assert!(split("http://[::1]x/").is_err());

        assert!(split("http://user@[2001:db8::1]:8080/a").is_ok());
        assert!(split("http://[fe80::1%25eth0]/").is_ok());
        assert!(split("http://[v1.fe80::a+en1]/").is_ok());
    }

    #[test]
    fn query_params_keep_repeats_and_blanks() {
        let parsed = split("http://x.com/?b=2&a=&b=3&c&a+b=%41").unwrap();
        assert_eq!(
            parsed.query_params(),
            vec![
                ("b".to_owned(), vec!["2".to_owned(), "3".to_owned()]),
                ("a".to_owned(), vec!["".to_owned()]),
                ("c".to_owned(), vec!["".to_owned()]),
                ("a b".to_owned(), vec!["A".to_owned()]),
            ]
        );
    }

    #[test]
    fn has_query_checks_original_query() {
        assert!(has_query("http://x.com/b?x=1"));
        assert!(!has_query("http://x.com/a"));
        assert!(!has_query("http://x.com/a?"));
        assert!(!has_query("http://x.com/a#?x=1"));
    }
}
