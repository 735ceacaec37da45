//! Crawl output.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::routing::{Meta, Route};

/// What the crawler keeps of a ready route: declared metadata, never content.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteSummary {
    pub title: Option<String>,
    pub meta: Meta,
}

impl From<&Route> for RouteSummary {
    fn from(route: &Route) -> Self {
        Self {
            title: route.title().map(str::to_string),
            meta: route.meta(),
        }
    }
}

/// Read-only snapshot of the statically reachable routing space, keyed by
/// canonical pathname. A pathname appears in at most one of the three maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteMap {
    pub routes: BTreeMap<String, RouteSummary>,
    pub redirects: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

impl SiteMap {
    /// Every pathname the crawl produced an entry for.
    pub fn len(&self) -> usize {
        self.routes.len() + self.redirects.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pathname: &str) -> bool {
        self.routes.contains_key(pathname)
            || self.redirects.contains_key(pathname)
            || self.errors.contains_key(pathname)
    }
}
