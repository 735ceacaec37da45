//! URL model used by every routing component.
//!
//! # Responsibilities
//! - Parse relative references and absolute http(s) URLs into pathname/search/hash
//! - Keep the decoded query map in sync with `search`
//! - Canonicalize pathnames (single trailing slash, collapsed separators)
//!
//! # Design Decisions
//! - Parsing is delegated to the `url` crate against a fixed local base, so
//!   dot-segments and percent-encoding follow WHATWG rules
//! - Equality and hashing ignore the fragment: two URLs that differ only by hash
//!   route to the same place
//! - Fields are private; a `Url` is only ever built by parsing, so `query` can
//!   never drift from `search`

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use thiserror::Error;

const LOCAL_BASE: &str = "http://localhost/";

/// Errors produced while parsing a URL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// The input could not be parsed at all.
    #[error("invalid URL '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// The input parsed, but has no hierarchical path (e.g. `mailto:`).
    #[error("URL '{0}' has no routable pathname")]
    NotHierarchical(String),
}

/// A routable URL.
#[derive(Debug, Clone, Serialize)]
pub struct Url {
    pathname: String,
    search: String,
    hash: String,
    query: BTreeMap<String, String>,
}

impl Url {
    /// Parse a relative reference (`/a/b?x=1#top`) or an absolute http(s) URL.
    ///
    /// The origin of absolute URLs is discarded.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        Self::parse_with_base(input, LOCAL_BASE)
    }

    /// Parse `input` relative to `base_pathname`, so `"team"` against `/about/`
    /// yields `/about/team`.
    pub fn resolve_against(input: &str, base_pathname: &str) -> Result<Self, UrlError> {
        let base = format!("http://localhost{base_pathname}");
        Self::parse_with_base(input, &base)
    }

    fn parse_with_base(input: &str, base: &str) -> Result<Self, UrlError> {
        let parse_err = |e: url::ParseError| UrlError::Parse {
            input: input.to_string(),
            reason: e.to_string(),
        };
        let base = url::Url::parse(base).map_err(parse_err)?;
        let parsed = base.join(input).map_err(parse_err)?;

        if parsed.cannot_be_a_base() {
            return Err(UrlError::NotHierarchical(input.to_string()));
        }

        let search = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();
        let hash = parsed.fragment().map(|f| format!("#{f}")).unwrap_or_default();
        let query = parsed.query_pairs().into_owned().collect();

        Ok(Self {
            pathname: parsed.path().to_string(),
            search,
            hash,
            query,
        })
    }

    /// The (percent-encoded) pathname. Always starts with `/`.
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// The raw query string including the leading `?`, or empty.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// The fragment including the leading `#`, or empty.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Decoded query pairs. Repeated keys keep the last value.
    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// The canonical form of this URL's pathname.
    pub fn canonical_pathname(&self) -> String {
        canonical_pathname(&self.pathname)
    }

    /// A copy of this URL with its pathname canonicalized.
    pub fn canonicalized(&self) -> Self {
        Self {
            pathname: self.canonical_pathname(),
            ..self.clone()
        }
    }

    /// `pathname + search`, the part of the URL routing depends on.
    pub fn route_key(&self) -> String {
        format!("{}{}", self.pathname, self.search)
    }
}

impl PartialEq for Url {
    fn eq(&self, other: &Self) -> bool {
        self.pathname == other.pathname && self.search == other.search
    }
}

impl Eq for Url {}

impl Hash for Url {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pathname.hash(state);
        self.search.hash(state);
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.pathname, self.search, self.hash)
    }
}

impl std::str::FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}

/// Split a pathname into its non-empty segments.
pub fn segments(pathname: &str) -> impl Iterator<Item = &str> {
    pathname.split('/').filter(|s| !s.is_empty())
}

/// Normalize a pathname to exactly one trailing slash with collapsed separators.
/// The bare root stays `/`.
pub fn canonical_pathname(pathname: &str) -> String {
    let joined = segments(pathname).collect::<Vec<_>>().join("/");
    if joined.is_empty() {
        "/".to_string()
    } else {
        format!("/{joined}/")
    }
}

/// Join a canonical mount pathname with a relative suffix, yielding a canonical
/// pathname.
pub fn join_pathname(mount: &str, suffix: &str) -> String {
    canonical_pathname(&format!("{mount}/{suffix}"))
}
