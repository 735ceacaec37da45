//! Top-down asynchronous resolution of one URL against a matcher tree.
//!
//! # Responsibilities
//! - Walk the tree from the root, consuming the pathname switch by switch
//! - Thread context down through context nodes
//! - Await lazy nodes and loaders, appending chunks in descent order
//! - Report the outcome as data (status + chunks), never as a panic or error
//!
//! # Design Decisions
//! - The walk is a loop over a single current node: a tree path is a chain, so
//!   no recursion or boxing of the descent itself is needed
//! - Loaders of one node run concurrently (`join!`); nodes run strictly in order
//! - A redirect is recorded, never followed; callers decide what to do with it

use std::time::Instant;

use futures_util::join;
use tracing::Instrument;

use crate::observability::metrics;
use crate::routing::context::Context;
use crate::routing::matcher::{LoadError, Loader, Matcher, MatcherNode, RouteRequest, SwitchNode};
use crate::routing::params::{deserialize_all, ParamSpec, Params, RawParams};
use crate::routing::pattern::Pattern;
use crate::routing::route::{Chunk, ChunkKind, Route, RouteStatus};
use crate::routing::url::{join_pathname, Url};

/// A switch passed through during resolution, with the pathname it is mounted at.
#[derive(Debug, Clone)]
pub(crate) struct SwitchVisit {
    pub pathname: String,
    pub node: Matcher,
}

/// A route plus the switches traversed to produce it.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub route: Route,
    pub switches: Vec<SwitchVisit>,
}

/// Resolve `url` against `tree` with the given initial context.
///
/// Loader failures, missing parameters and unmatched pathnames all come back
/// as a `Route` whose status says what happened.
pub async fn resolve(tree: &Matcher, url: &Url, context: &Context) -> Route {
    resolve_with_trail(tree, url, context).await.route
}

pub(crate) async fn resolve_with_trail(tree: &Matcher, url: &Url, context: &Context) -> Resolution {
    let span = tracing::debug_span!("resolve", pathname = %url.pathname());
    walk(tree, url, context).instrument(span).await
}

async fn walk(tree: &Matcher, url: &Url, initial_context: &Context) -> Resolution {
    let started = Instant::now();
    let url = url.canonicalized();

    let mut node = tree.clone();
    let mut remainder = url.pathname().to_string();
    let mut mount = "/".to_string();
    let mut parent_mount = "/".to_string();
    let mut context = initial_context.clone();
    let mut raw: RawParams = url.query().clone();
    let mut specs: Vec<ParamSpec> = Vec::new();
    let mut params: Params = deserialize_all(&specs, &raw).unwrap_or_default();
    let mut chunks = Vec::new();
    let mut switches = Vec::new();

    let status = loop {
        let request = RouteRequest {
            url: url.clone(),
            pathname: mount.clone(),
            params: params.clone(),
            context: context.clone(),
        };

        let next = match &*node {
            MatcherNode::Context(ctx) => {
                context = ctx.apply(&context);
                ctx.inner.clone()
            }

            MatcherNode::Lazy(lazy) => match lazy.load().await {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!(pathname = %mount, error = %e, "Lazy matcher failed to load");
                    chunks.push(Chunk::new(&mount, ChunkKind::Error { message: e.to_string() }));
                    break RouteStatus::Error;
                }
            },

            MatcherNode::Switch(switch) => {
                switches.push(SwitchVisit {
                    pathname: mount.clone(),
                    node: node.clone(),
                });

                let selected = match switch.select(&remainder) {
                    Ok(selected) => selected,
                    Err(e) => {
                        tracing::error!(pathname = %mount, error = %e, "Ambiguous switch");
                        chunks.push(Chunk::new(&mount, ChunkKind::Error { message: e.to_string() }));
                        break RouteStatus::Error;
                    }
                };
                let Some((pattern, child, matched)) = selected else {
                    break RouteStatus::NotFound;
                };

                raw.extend(matched.params);
                specs.extend(applicable_specs(switch, pattern));
                params = match deserialize_all(&specs, &raw) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!(pathname = %mount, error = %e, "Switch parameters rejected");
                        break RouteStatus::NotFound;
                    }
                };
                let request = RouteRequest { params: params.clone(), ..request };

                let (title, meta, data, content) = join!(
                    load_optional(&switch.title, &request),
                    load_optional(&switch.meta, &request),
                    load_optional(&switch.data, &request),
                    load_optional(&switch.content, &request),
                );
                let mut failed = false;
                push_loaded(&mut chunks, &mount, title, |title| ChunkKind::Title { title }, &mut failed);
                push_loaded(&mut chunks, &mount, meta, |meta| ChunkKind::Head { meta }, &mut failed);
                push_loaded(&mut chunks, &mount, data, |data| ChunkKind::Data { data }, &mut failed);
                push_loaded(&mut chunks, &mount, content, |content| ChunkKind::Content { content }, &mut failed);
                if failed {
                    break RouteStatus::Error;
                }

                parent_mount = mount.clone();
                mount = join_pathname(&mount, &matched.consumed);
                remainder = matched.remainder;
                child.clone()
            }

            MatcherNode::Page(page) => {
                if remainder != "/" {
                    break RouteStatus::NotFound;
                }
                let page_specs: Vec<ParamSpec> = specs.iter().chain(&page.params).cloned().collect();
                params = match deserialize_all(&page_specs, &raw) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!(pathname = %mount, error = %e, "Page parameters rejected");
                        break RouteStatus::NotFound;
                    }
                };
                let request = RouteRequest { params: params.clone(), ..request };

                let (title, meta, content) = join!(
                    load_optional(&page.title, &request),
                    load_optional(&page.meta, &request),
                    page.content.load(request.clone()),
                );
                let mut failed = false;
                push_loaded(&mut chunks, &mount, title, |title| ChunkKind::Title { title }, &mut failed);
                push_loaded(&mut chunks, &mount, meta, |meta| ChunkKind::Head { meta }, &mut failed);
                push_loaded(&mut chunks, &mount, Some(content), |content| ChunkKind::Content { content }, &mut failed);

                break if failed { RouteStatus::Error } else { RouteStatus::Ready };
            }

            MatcherNode::Redirect(redirect) => {
                if remainder != "/" {
                    break RouteStatus::NotFound;
                }
                let target = redirect
                    .target
                    .load(request)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|t| Url::resolve_against(&t, &parent_mount).map_err(|e| e.to_string()));

                match target {
                    Ok(target) => {
                        let to = format!("{}{}", target.canonical_pathname(), target.search());
                        chunks.push(Chunk::new(&mount, ChunkKind::Redirect { to }));
                        break RouteStatus::Redirect;
                    }
                    Err(message) => {
                        tracing::warn!(pathname = %mount, error = %message, "Redirect target failed");
                        chunks.push(Chunk::new(&mount, ChunkKind::Error { message }));
                        break RouteStatus::Error;
                    }
                }
            }
        };

        node = next;
    };

    metrics::record_resolution(status, started);
    tracing::debug!(status = status.as_str(), chunks = chunks.len(), "Route resolved");

    Resolution {
        route: Route {
            url,
            status,
            chunks,
            params,
            context,
        },
        switches,
    }
}

/// Specs of `switch` that apply once `selected` matched: query parameters plus
/// the path parameters `selected` captures. Path parameters owned by sibling
/// templates are left out, so `/` next to `/:slug` does not require `slug`.
fn applicable_specs<'a>(
    switch: &'a SwitchNode,
    selected: &'a Pattern,
) -> impl Iterator<Item = ParamSpec> + 'a {
    switch
        .params
        .iter()
        .filter(move |spec| {
            let name = spec.name();
            selected.param_names().contains(name)
                || !switch.children().iter().any(|(p, _)| p.param_names().contains(name))
        })
        .cloned()
}

async fn load_optional<T>(
    loader: &Option<Loader<T>>,
    request: &RouteRequest,
) -> Option<Result<T, LoadError>>
where
    T: Clone + Send + Sync + 'static,
{
    match loader {
        Some(loader) => Some(loader.load(request.clone()).await),
        None => None,
    }
}

fn push_loaded<T, E: std::fmt::Display>(
    chunks: &mut Vec<Chunk>,
    pathname: &str,
    loaded: Option<Result<T, E>>,
    wrap: impl FnOnce(T) -> ChunkKind,
    failed: &mut bool,
) {
    match loaded {
        Some(Ok(value)) => chunks.push(Chunk::new(pathname, wrap(value))),
        Some(Err(e)) => {
            tracing::warn!(pathname = %pathname, error = %e, "Loader failed");
            chunks.push(Chunk::new(pathname, ChunkKind::Error { message: e.to_string() }));
            *failed = true;
        }
        None => {}
    }
}
