//! The matcher tree: an immutable, declarative description of the routing space.
//!
//! # Responsibilities
//! - Define the node variants (page, redirect, switch, context, lazy)
//! - Provide builders that compile and validate patterns eagerly
//! - Hold the user-supplied async loaders invoked during resolution
//!
//! # Design Decisions
//! - Nodes are plain data shared through `Arc`; no parent back-references
//! - Building a tree never runs a loader or does I/O
//! - Ambiguous siblings are rejected when the switch is built, not when a URL
//!   happens to hit them

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use thiserror::Error;

use crate::routing::context::Context;
use crate::routing::params::{ParamSpec, Params};
use crate::routing::pattern::{Pattern, PatternError, PatternMatch};
use crate::routing::url::Url;

/// Shared handle to a node. Sharing a node between parents is legal.
pub type Matcher = Arc<MatcherNode>;

/// Head metadata (`name -> content`).
pub type Meta = BTreeMap<String, String>;

/// Failure reported by an application loader.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LoadError(String);

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for LoadError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for LoadError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// What a loader gets to see about the URL being resolved.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// The full URL under resolution.
    pub url: Url,
    /// Canonical pathname consumed up to the node being loaded.
    pub pathname: String,
    /// Typed params accumulated so far.
    pub params: Params,
    /// Context as seen by this node.
    pub context: Context,
}

/// An async loader producing a `T` for a request.
pub struct Loader<T>(Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, Result<T, LoadError>> + Send + Sync>);

impl<T> Loader<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap an async function.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, LoadError>> + Send + 'static,
    {
        Self(Arc::new(move |req| f(req).boxed()))
    }

    /// A loader that always yields `value`.
    pub fn value(value: T) -> Self {
        Self(Arc::new(move |_| future::ready(Ok(value.clone())).boxed()))
    }

    pub fn load(&self, request: RouteRequest) -> BoxFuture<'static, Result<T, LoadError>> {
        (self.0)(request)
    }
}

impl<T> Clone for Loader<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Loader(..)")
    }
}

type TransformFn = Arc<dyn Fn(&Context) -> Context + Send + Sync>;
type LazyFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Matcher, LoadError>> + Send + Sync>;

/// A node of the matcher tree.
#[derive(Debug)]
pub enum MatcherNode {
    Page(PageNode),
    Redirect(RedirectNode),
    Switch(SwitchNode),
    Context(ContextNode),
    Lazy(LazyNode),
}

impl MatcherNode {
    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MatcherNode::Page(_) => "page",
            MatcherNode::Redirect(_) => "redirect",
            MatcherNode::Switch(_) => "switch",
            MatcherNode::Context(_) => "context",
            MatcherNode::Lazy(_) => "lazy",
        }
    }
}

/// Terminal node producing title, head and content chunks.
#[derive(Debug)]
pub struct PageNode {
    pub title: Option<Loader<String>>,
    pub meta: Option<Loader<Meta>>,
    pub content: Loader<Value>,
    pub params: Vec<ParamSpec>,
}

/// Terminal node that ends resolution with a redirect.
#[derive(Debug)]
pub struct RedirectNode {
    pub target: Loader<String>,
}

/// Internal node choosing one child by pattern.
#[derive(Debug)]
pub struct SwitchNode {
    children: Vec<(Pattern, Matcher)>,
    pub title: Option<Loader<String>>,
    pub meta: Option<Loader<Meta>>,
    pub data: Option<Loader<Value>>,
    pub content: Option<Loader<Value>>,
    pub params: Vec<ParamSpec>,
}

impl SwitchNode {
    /// Children in declaration order.
    pub fn children(&self) -> &[(Pattern, Matcher)] {
        &self.children
    }

    /// Pick the most specific child matching the front of `remainder`.
    pub fn select(&self, remainder: &str) -> Result<Option<(&Pattern, &Matcher, PatternMatch)>, PatternError> {
        let mut best: Option<(&Pattern, &Matcher, PatternMatch)> = None;

        for (pattern, child) in &self.children {
            let Some(m) = pattern.match_prefix(remainder) else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some((current, _, _)) => {
                    if current.specificity() == pattern.specificity() {
                        return Err(PatternError::AmbiguousRoute {
                            first: current.template().to_string(),
                            second: pattern.template().to_string(),
                        });
                    }
                    pattern.specificity() > current.specificity()
                }
            };
            if replace {
                best = Some((pattern, child, m));
            }
        }

        Ok(best)
    }
}

/// Rewrites the context for its subtree without consuming pathname.
pub struct ContextNode {
    transform: TransformFn,
    pub inner: Matcher,
}

impl ContextNode {
    pub fn apply(&self, context: &Context) -> Context {
        (self.transform)(context)
    }
}

impl fmt::Debug for ContextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextNode")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

/// Placeholder whose node is loaded on every resolution pass.
pub struct LazyNode {
    load: LazyFn,
}

impl LazyNode {
    pub fn load(&self) -> BoxFuture<'static, Result<Matcher, LoadError>> {
        (self.load)()
    }
}

impl fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyNode(..)")
    }
}

// ----------------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------------

/// Start a page.
pub fn page() -> PageBuilder {
    PageBuilder::default()
}

/// Start a switch.
pub fn switch() -> SwitchBuilder {
    SwitchBuilder::default()
}

/// Redirect to a fixed target. Relative targets resolve against the pathname
/// of the switch that mounts the redirect.
pub fn redirect_to(target: impl Into<String>) -> Matcher {
    Arc::new(MatcherNode::Redirect(RedirectNode {
        target: Loader::value(target.into()),
    }))
}

/// Redirect to a computed target.
pub fn redirect<F, Fut>(target: F) -> Matcher
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, LoadError>> + Send + 'static,
{
    Arc::new(MatcherNode::Redirect(RedirectNode {
        target: Loader::from_fn(target),
    }))
}

/// Give `inner` a context derived from its parent's.
pub fn with_context<F>(transform: F, inner: Matcher) -> Matcher
where
    F: Fn(&Context) -> Context + Send + Sync + 'static,
{
    Arc::new(MatcherNode::Context(ContextNode {
        transform: Arc::new(transform),
        inner,
    }))
}

/// Defer building a subtree until it is first needed in a pass.
pub fn lazy<F, Fut>(load: F) -> Matcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Matcher, LoadError>> + Send + 'static,
{
    Arc::new(MatcherNode::Lazy(LazyNode {
        load: Arc::new(move || load().boxed()),
    }))
}

#[derive(Default)]
pub struct PageBuilder {
    title: Option<Loader<String>>,
    meta: Option<Loader<Meta>>,
    content: Option<Loader<Value>>,
    params: Vec<ParamSpec>,
}

impl PageBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(Loader::value(title.into()));
        self
    }

    pub fn title_with(mut self, loader: Loader<String>) -> Self {
        self.title = Some(loader);
        self
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(Loader::value(meta));
        self
    }

    pub fn meta_with(mut self, loader: Loader<Meta>) -> Self {
        self.meta = Some(loader);
        self
    }

    pub fn content(mut self, content: impl Into<Value>) -> Self {
        self.content = Some(Loader::value(content.into()));
        self
    }

    pub fn content_with(mut self, loader: Loader<Value>) -> Self {
        self.content = Some(loader);
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn build(self) -> Matcher {
        Arc::new(MatcherNode::Page(PageNode {
            title: self.title,
            meta: self.meta,
            content: self.content.unwrap_or_else(|| Loader::value(Value::Null)),
            params: self.params,
        }))
    }
}

#[derive(Default)]
pub struct SwitchBuilder {
    children: Vec<(String, Matcher)>,
    title: Option<Loader<String>>,
    meta: Option<Loader<Meta>>,
    data: Option<Loader<Value>>,
    content: Option<Loader<Value>>,
    params: Vec<ParamSpec>,
}

impl SwitchBuilder {
    /// Add a child under `template`.
    pub fn child(mut self, template: impl Into<String>, node: Matcher) -> Self {
        self.children.push((template.into(), node));
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(Loader::value(title.into()));
        self
    }

    pub fn title_with(mut self, loader: Loader<String>) -> Self {
        self.title = Some(loader);
        self
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(Loader::value(meta));
        self
    }

    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(Loader::value(data.into()));
        self
    }

    pub fn data_with(mut self, loader: Loader<Value>) -> Self {
        self.data = Some(loader);
        self
    }

    pub fn content(mut self, content: impl Into<Value>) -> Self {
        self.content = Some(Loader::value(content.into()));
        self
    }

    pub fn content_with(mut self, loader: Loader<Value>) -> Self {
        self.content = Some(loader);
        self
    }

    /// Declare a parameter. Once any parameter is declared, child templates may
    /// only reference declared names.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Compile every child pattern and reject ambiguous siblings.
    pub fn build(self) -> Result<Matcher, PatternError> {
        let declared: Vec<&str> = self.params.iter().map(ParamSpec::name).collect();
        let mut children: Vec<(Pattern, Matcher)> = Vec::with_capacity(self.children.len());

        for (template, node) in self.children {
            let pattern = if declared.is_empty() {
                Pattern::parse(&template)?
            } else {
                Pattern::compile(&template, &declared)?
            };

            for name in pattern.param_names() {
                let optional = self
                    .params
                    .iter()
                    .find(|s| s.name() == name)
                    .is_some_and(|s| !s.is_required() && s.default().is_none());
                if optional {
                    return Err(PatternError::InvalidTemplate {
                        template: template.clone(),
                        reason: format!("path parameter '{name}' must be required or have a default"),
                    });
                }
            }

            if let Some((existing, _)) = children.iter().find(|(p, _)| p.overlaps(&pattern)) {
                return Err(PatternError::AmbiguousRoute {
                    first: existing.template().to_string(),
                    second: pattern.template().to_string(),
                });
            }

            children.push((pattern, node));
        }

        Ok(Arc::new(MatcherNode::Switch(SwitchNode {
            children,
            title: self.title,
            meta: self.meta,
            data: self.data,
            content: self.content,
            params: self.params,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_rejects_ambiguous_children() {
        let err = switch()
            .child("/a/:x", page().build())
            .child("/:y/b", page().build())
            .build()
            .unwrap_err();
        assert!(matches!(err, PatternError::AmbiguousRoute { .. }));

        let err = switch()
            .child("/about", page().build())
            .child("/about", page().build())
            .build()
            .unwrap_err();
        assert!(matches!(err, PatternError::AmbiguousRoute { .. }));
    }

    #[test]
    fn test_switch_rejects_bad_templates() {
        assert!(switch().child("about", page().build()).build().is_err());
        assert!(switch()
            .param(ParamSpec::string("id").required())
            .child("/users/:slug", page().build())
            .build()
            .is_err());
    }

    #[test]
    fn test_optional_path_param_rejected() {
        let err = switch()
            .param(ParamSpec::string("id"))
            .child("/users/:id", page().build())
            .build()
            .unwrap_err();
        assert!(matches!(err, PatternError::InvalidTemplate { .. }));

        assert!(switch()
            .param(ParamSpec::string("id").default_value("me"))
            .child("/users/:id", page().build())
            .build()
            .is_ok());
    }

    #[test]
    fn test_select_most_specific() {
        let tree = switch()
            .child("/", page().title("index").build())
            .child("/:slug", page().title("slug").build())
            .child("/about", page().title("about").build())
            .build()
            .unwrap();
        let MatcherNode::Switch(node) = &*tree else {
            panic!("expected switch");
        };

        let (pattern, _, _) = node.select("/about/").unwrap().unwrap();
        assert_eq!(pattern.template(), "/about");

        let (pattern, _, m) = node.select("/hello/").unwrap().unwrap();
        assert_eq!(pattern.template(), "/:slug");
        assert_eq!(m.params.get("slug").map(String::as_str), Some("hello"));

        let (pattern, _, _) = node.select("/").unwrap().unwrap();
        assert_eq!(pattern.template(), "/");
    }

    #[test]
    fn test_building_never_invokes_loaders() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let _tree = switch()
            .child(
                "/lazy",
                lazy(move || {
                    flag.store(true, Ordering::SeqCst);
                    async { Ok(page().build()) }
                }),
            )
            .build()
            .unwrap();
        assert!(!called.load(Ordering::SeqCst));
    }
}
