//! Site crawler.
//!
//! # Data Flow
//! ```text
//! root pathname
//!     → queue (FIFO, canonical pathnames, visited-set dedup)
//!     → resolve_with_trail (bounded number in flight)
//!     → outcome:
//!         ready    → routes[p] = { title, meta }
//!         redirect → redirects[p] = target, enqueue target
//!         error    → errors[p] = message
//!         notfound → skipped
//!     → children of every traversed switch (static, or via PatternExpander)
//!     → queue
//! ```
//!
//! # Design Decisions
//! - One supervising loop owns the queue, the visited set and the map; workers
//!   are futures in a `FuturesUnordered`, so there is a single writer
//! - A pathname is marked visited when enqueued, so it is resolved at most once
//! - Parameterized children are never guessed; only an expander can reach them
//! - Switches are expanded even when their own pathname is not a page

pub mod expand;
pub mod sitemap;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::config::CrawlerConfig;
use crate::observability::metrics;
use crate::routing::resolver::{resolve_with_trail, Resolution};
use crate::routing::url::canonical_pathname;
use crate::routing::{Context, Matcher, RouteStatus, Url};

pub use expand::PatternExpander;
pub use sitemap::{RouteSummary, SiteMap};

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Runtime crawl settings.
#[derive(Clone)]
pub struct CrawlConfig {
    /// Resolutions kept in flight at once (at least 1).
    pub concurrency: usize,
    /// Upper bound on resolved pathnames.
    pub max_pages: usize,
    /// Per-page deadline; an expired page becomes an error entry.
    pub page_timeout: Option<Duration>,
    predicate: Option<Predicate>,
    expander: Option<Arc<dyn PatternExpander>>,
}

impl CrawlConfig {
    /// Only enqueue pathnames for which `predicate` returns true.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn with_expander<E>(mut self, expander: E) -> Self
    where
        E: PatternExpander + 'static,
    {
        self.expander = Some(Arc::new(expander));
        self
    }

    fn allows(&self, pathname: &str) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(pathname))
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlConfig {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            max_pages: config.max_pages,
            page_timeout: config.page_timeout_secs.map(Duration::from_secs),
            predicate: None,
            expander: None,
        }
    }
}

impl fmt::Debug for CrawlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlConfig")
            .field("concurrency", &self.concurrency)
            .field("max_pages", &self.max_pages)
            .field("page_timeout", &self.page_timeout)
            .field("predicate", &self.predicate.is_some())
            .field("expander", &self.expander.is_some())
            .finish()
    }
}

type Outcome = (String, Result<Resolution, String>);

struct Crawl<'a> {
    config: &'a CrawlConfig,
    queue: VecDeque<String>,
    visited: HashSet<String>,
    expanded: HashSet<String>,
    map: SiteMap,
}

impl Crawl<'_> {
    fn enqueue(&mut self, pathname: &str) {
        let pathname = canonical_pathname(pathname);
        if self.visited.contains(&pathname) || !self.config.allows(&pathname) {
            return;
        }
        self.visited.insert(pathname.clone());
        self.queue.push_back(pathname);
    }

    fn record(&mut self, pathname: String, outcome: Result<Resolution, String>) {
        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(message) => {
                tracing::warn!(pathname = %pathname, error = %message, "Page failed");
                metrics::record_crawl_page("error");
                self.map.errors.insert(pathname, message);
                return;
            }
        };

        let route = &resolution.route;
        metrics::record_crawl_page(route.status.as_str());

        match route.status {
            RouteStatus::Ready => {
                self.map.routes.insert(pathname.clone(), route.into());
            }
            RouteStatus::Redirect => {
                let target = route.redirect_target().unwrap_or("/");
                match Url::parse(target) {
                    Ok(url) => {
                        self.enqueue(url.pathname());
                        self.map.redirects.insert(pathname.clone(), url.canonical_pathname());
                    }
                    Err(e) => {
                        tracing::warn!(
                            pathname = %pathname,
                            target = %target,
                            error = %e,
                            "Unparseable redirect target"
                        );
                        self.map.errors.insert(pathname.clone(), format!("invalid redirect target '{target}': {e}"));
                    }
                }
            }
            RouteStatus::NotFound => {
                tracing::debug!(pathname = %pathname, "No route, skipping");
            }
            RouteStatus::Error | RouteStatus::Busy => {
                let message = route.error().unwrap_or("resolution failed").to_string();
                tracing::warn!(pathname = %pathname, error = %message, "Page failed");
                self.map.errors.insert(pathname.clone(), message);
            }
        }

        for visit in &resolution.switches {
            if !self.expanded.insert(visit.pathname.clone()) {
                continue;
            }
            for child in expand::child_pathnames(&visit.pathname, &visit.node, self.config.expander.as_ref()) {
                self.enqueue(&child);
            }
        }
    }
}

/// Enumerate every statically reachable pathname under `root`.
pub async fn crawl(tree: &Matcher, root: &str, context: &Context, config: &CrawlConfig) -> SiteMap {
    let concurrency = config.concurrency.max(1);
    let mut state = Crawl {
        config,
        queue: VecDeque::new(),
        visited: HashSet::new(),
        expanded: HashSet::new(),
        map: SiteMap::default(),
    };
    state.enqueue(root);

    tracing::info!(root = %root, concurrency, max_pages = config.max_pages, "Crawl started");

    let mut in_flight: FuturesUnordered<BoxFuture<'static, Outcome>> = FuturesUnordered::new();
    let mut dispatched = 0usize;

    loop {
        while in_flight.len() < concurrency && dispatched < config.max_pages {
            let Some(pathname) = state.queue.pop_front() else {
                break;
            };
            dispatched += 1;
            in_flight.push(visit(tree.clone(), pathname, context.clone(), config.page_timeout).boxed());
        }

        let Some((pathname, outcome)) = in_flight.next().await else {
            break;
        };
        state.record(pathname, outcome);
    }

    if !state.queue.is_empty() {
        tracing::warn!(
            remaining = state.queue.len(),
            max_pages = config.max_pages,
            "Crawl stopped at page limit"
        );
    }

    tracing::info!(
        routes = state.map.routes.len(),
        redirects = state.map.redirects.len(),
        errors = state.map.errors.len(),
        resolved = dispatched,
        "Crawl finished"
    );

    state.map
}

async fn visit(tree: Matcher, pathname: String, context: Context, deadline: Option<Duration>) -> Outcome {
    let url = match Url::parse(&pathname) {
        Ok(url) => url,
        Err(e) => return (pathname, Err(e.to_string())),
    };

    let resolution = resolve_with_trail(&tree, &url, &context);
    let outcome = match deadline {
        Some(limit) => tokio::time::timeout(limit, resolution)
            .await
            .map_err(|_| format!("timed out after {}s", limit.as_secs_f64())),
        None => Ok(resolution.await),
    };

    (pathname, outcome)
}
