//! Comparison keys for URLs.
//!
//! Two URLs are duplicates if their keys are equal. Keys are pure functions of
//! the input string and the [`Mode`], so they can be computed on any thread in
//! any order.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::parse::{
    split,
    ParsedUrl,
};

pub const DEFAULT_COLLAPSE_DEPTH: usize = 2;

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+").unwrap());
static FILE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[a-zA-Z0-9]+$").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Full path, query parameter names (and optionally values).
    Exact { ignore_values: bool },
    /// Numeric IDs and file extensions are wildcarded, query is dropped, and
    /// the path is cut to `collapse_depth` segments if set.
    Similar { collapse_depth: Option<usize> },
}

impl Default for Mode {
    fn default() -> Self {
        Self::Exact {
            ignore_values: true,
        }
    }
}

impl Mode {
    pub fn key(&self, url: &str) -> String {
        match *self {
            Mode::Exact { ignore_values } => normalize(url, ignore_values),
            Mode::Similar { collapse_depth } => normalize_similar(url, collapse_depth),
        }
    }
}

/// Exact key: `scheme://authority/path?query` with sorted parameter names.
/// Fragment and params are dropped.
pub fn normalize(url: &str, ignore_values: bool) -> String {
    let Ok(parsed) = split(url)
    else {
        return url.trim().to_owned();
    };

    let mut params = parsed.query_params();
    params.sort_by(|(a, _), (b, _)| a.cmp(b));

    let query = params
        .iter()
        .map(|(name, values)| {
            if ignore_values {
                format!("{name}=")
            }
            else {
                format!("{name}={}", values.join(","))
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    let mut key = assemble(&parsed);
    if !query.is_empty() {
        key.push('?');
        key.push_str(&query);
    }
    key
}

/// Similarity key: `scheme://authority` plus a generalized path.
///
/// Numeric segments become `{id}`, a trailing file extension becomes `.*`,
/// and with `collapse_depth` set, only that many leading segments are kept,
/// followed by `/*`. A depth of 0 is treated as 1.
pub fn normalize_similar(url: &str, collapse_depth: Option<usize>) -> String {
    let Ok(parsed) = split(url)
    else {
        return url.trim().to_owned();
    };

    let path = NUMERIC_SEGMENT.replace_all(&parsed.path, "/{id}");
    let mut path = FILE_EXTENSION.replace(&path, ".*").into_owned();

    if let Some(depth) = collapse_depth {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .take(depth.max(1))
            .collect::<Vec<_>>();
        if !segments.is_empty() {
            path = format!("/{}/*", segments.join("/"));
        }
    }

    format!("{}://{}{path}", parsed.scheme, parsed.authority)
}

fn assemble(parsed: &ParsedUrl) -> String {
    let mut out = String::new();

    if !parsed.scheme.is_empty() {
        out.push_str(&parsed.scheme);
        out.push(':');
    }

    if !parsed.authority.is_empty() {
        out.push_str("//");
        out.push_str(&parsed.authority);
        if !parsed.path.is_empty() && !parsed.path.starts_with('/') {
            out.push('/');
        }
    }

    out.push_str(&parsed.path);
    out
}
