//! Path template compilation and matching.
//!
//! # Responsibilities
//! - Validate templates (`/literal/:param/literal2`)
//! - Match a compiled pattern against the front of a pathname suffix
//! - Format a pathname back from raw parameter values
//!
//! # Design Decisions
//! - Segment-by-segment comparison, no regex
//! - Parameters capture exactly one segment as a raw (percent-decoded) string;
//!   typing is the param codec's job
//! - Specificity is (literal segments, total segments); equal specificity on
//!   overlapping patterns is a construction error

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

use crate::routing::url::{canonical_pathname, segments};

/// Characters that must be escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Errors raised while compiling or formatting patterns, and while assembling
/// switches out of them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("invalid pattern '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("pattern '{template}' references undeclared parameter '{name}'")]
    UndeclaredParam { template: String, name: String },

    #[error("cannot format '{template}': missing parameter '{name}'")]
    MissingParam { template: String, name: String },

    #[error("cannot format '{template}': unknown parameter '{name}'")]
    UnknownParam { template: String, name: String },

    #[error("patterns '{first}' and '{second}' are ambiguous")]
    AmbiguousRoute { first: String, second: String },
}

/// One compiled segment of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// Result of matching a pattern against a pathname suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Canonical pathname of the consumed segments (`/` when nothing was consumed).
    pub consumed: String,
    /// Canonical pathname of what is left (`/` when everything was consumed).
    pub remainder: String,
    /// Raw captured parameter values.
    pub params: BTreeMap<String, String>,
}

impl PatternMatch {
    /// True when the pattern consumed the whole suffix.
    pub fn is_exact(&self) -> bool {
        self.remainder == "/"
    }
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    template: String,
    segments: Vec<Segment>,
    params: BTreeSet<String>,
}

impl Pattern {
    /// Compile a template, treating every `:name` it mentions as declared.
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        Self::build(template, None)
    }

    /// Compile a template whose parameters must all appear in `declared`.
    pub fn compile<I, S>(template: &str, declared: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let declared: BTreeSet<String> = declared
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        Self::build(template, Some(&declared))
    }

    fn build(template: &str, declared: Option<&BTreeSet<String>>) -> Result<Self, PatternError> {
        let invalid = |reason: &str| PatternError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        if !template.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if template.contains("//") {
            return Err(invalid("must not contain adjacent '/'"));
        }
        if template.len() > 1 && template.ends_with('/') {
            return Err(invalid("must not end with '/'"));
        }

        let mut compiled = Vec::new();
        let mut params = BTreeSet::new();

        for raw in segments(template) {
            if let Some(name) = raw.strip_prefix(':') {
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid("parameter names must be non-empty [A-Za-z0-9_]"));
                }
                if let Some(declared) = declared {
                    if !declared.contains(name) {
                        return Err(PatternError::UndeclaredParam {
                            template: template.to_string(),
                            name: name.to_string(),
                        });
                    }
                }
                if !params.insert(name.to_string()) {
                    return Err(invalid("parameter declared twice"));
                }
                compiled.push(Segment::Param(name.to_string()));
            } else {
                if !raw.chars().all(is_url_safe) {
                    return Err(invalid("literal segments must be URL-safe"));
                }
                compiled.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            template: template.to_string(),
            segments: compiled,
            params,
        })
    }

    /// The source template.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names this pattern captures.
    pub fn param_names(&self) -> &BTreeSet<String> {
        &self.params
    }

    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// True when the pattern has no parameters and can be enumerated as-is.
    pub fn is_static(&self) -> bool {
        self.params.is_empty()
    }

    /// Ordering key used to pick among several matching siblings.
    pub fn specificity(&self) -> (usize, usize) {
        (self.literal_count(), self.segment_count())
    }

    /// True when some pathname would be matched by both patterns with equal
    /// specificity.
    pub fn overlaps(&self, other: &Pattern) -> bool {
        if self.specificity() != other.specificity() {
            return false;
        }
        self.segments
            .iter()
            .zip(&other.segments)
            .all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                _ => true,
            })
    }

    /// Match against the front of `suffix`.
    pub fn match_prefix(&self, suffix: &str) -> Option<PatternMatch> {
        let path: Vec<&str> = segments(suffix).collect();
        if path.len() < self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, actual) in self.segments.iter().zip(&path) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != actual {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let decoded = percent_decode_str(actual).decode_utf8().ok()?;
                    params.insert(name.clone(), decoded.into_owned());
                }
            }
        }

        let (consumed, rest) = path.split_at(self.segments.len());
        Some(PatternMatch {
            consumed: canonical_pathname(&consumed.join("/")),
            remainder: canonical_pathname(&rest.join("/")),
            params,
        })
    }

    /// Build a pathname from raw parameter values. Left inverse of
    /// [`Pattern::match_prefix`].
    pub fn format(&self, params: &BTreeMap<String, String>) -> Result<String, PatternError> {
        if let Some(unknown) = params.keys().find(|k| !self.params.contains(*k)) {
            return Err(PatternError::UnknownParam {
                template: self.template.clone(),
                name: unknown.clone(),
            });
        }

        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(name) => {
                    let value = params.get(name).ok_or_else(|| PatternError::MissingParam {
                        template: self.template.clone(),
                        name: name.clone(),
                    })?;
                    out.extend(utf8_percent_encode(value, SEGMENT));
                }
            }
        }

        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

fn is_url_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '@' | '+' | ',' | '!')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_rejects_malformed_templates() {
        for bad in ["about", "/a//b", "/about/", "/:", "/a b", "/:x/:x"] {
            assert!(
                matches!(Pattern::parse(bad), Err(PatternError::InvalidTemplate { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_undeclared_param() {
        let err = Pattern::compile("/users/:id", ["slug"]).unwrap_err();
        assert_eq!(
            err,
            PatternError::UndeclaredParam {
                template: "/users/:id".into(),
                name: "id".into()
            }
        );
        assert!(Pattern::compile("/users/:id", ["id"]).is_ok());
    }

    #[test]
    fn test_root_matches_everything_without_consuming() {
        let root = Pattern::parse("/").unwrap();
        let m = root.match_prefix("/about/").unwrap();
        assert_eq!(m.consumed, "/");
        assert_eq!(m.remainder, "/about/");
        assert!(root.match_prefix("/").unwrap().is_exact());
    }

    #[test]
    fn test_prefix_match_with_params() {
        let p = Pattern::parse("/users/:id").unwrap();
        let m = p.match_prefix("/users/42/posts/").unwrap();
        assert_eq!(m.consumed, "/users/42/");
        assert_eq!(m.remainder, "/posts/");
        assert_eq!(m.params, params(&[("id", "42")]));

        assert!(p.match_prefix("/users/").is_none());
        assert!(p.match_prefix("/people/42").is_none());
    }

    #[test]
    fn test_format_round_trip() {
        let p = Pattern::parse("/users/:id/files/:name").unwrap();
        for values in [
            params(&[("id", "42"), ("name", "report")]),
            params(&[("id", "a b"), ("name", "x/y?z#w")]),
            params(&[("id", "ünïcode"), ("name", "100%")]),
        ] {
            let path = p.format(&values).unwrap();
            let m = p.match_prefix(&path).unwrap();
            assert_eq!(m.params, values, "round trip through {path}");
            assert!(m.is_exact());
        }
    }

    #[test]
    fn test_format_errors() {
        let p = Pattern::parse("/users/:id").unwrap();
        assert!(matches!(
            p.format(&BTreeMap::new()),
            Err(PatternError::MissingParam { .. })
        ));
        assert!(matches!(
            p.format(&params(&[("id", "1"), ("extra", "2")])),
            Err(PatternError::UnknownParam { .. })
        ));
        assert_eq!(Pattern::parse("/").unwrap().format(&BTreeMap::new()).unwrap(), "/");
    }

    #[test]
    fn test_overlaps() {
        let a = Pattern::parse("/a/:x").unwrap();
        let b = Pattern::parse("/:y/b").unwrap();
        let c = Pattern::parse("/a/b").unwrap();
        let d = Pattern::parse("/c/:x").unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
        assert!(Pattern::parse("/:id").unwrap().overlaps(&Pattern::parse("/:slug").unwrap()));
    }
}
