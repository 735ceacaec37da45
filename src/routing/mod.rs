//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Tree Construction (once, synchronous):
//!     builders (matcher.rs) or a [site] config table
//!     → pattern.rs (compile templates, check declared params)
//!     → SwitchBuilder::build (reject ambiguous siblings)
//!     → immutable Matcher (Arc, Send + Sync)
//!
//! Resolution (per URL, async):
//!     Url (url.rs, canonical pathname + query)
//!     → resolver.rs (descend: context → lazy → switch → page | redirect)
//!     → params.rs (raw captures + query → typed values)
//!     → loaders (title, meta, data, content, redirect target)
//!     → Route { status, chunks } (route.rs)
//! ```
//!
//! # Design Decisions
//! - Trees are immutable after construction and may share nodes
//! - Most specific pattern wins (literal segments, then total segments)
//! - Deterministic: the same tree, URL and context always yield the same chunks
//!   given deterministic loaders
//! - Per-request failures are data on the route, never errors or panics

pub mod context;
pub mod matcher;
pub mod params;
pub mod pattern;
pub mod resolver;
pub mod route;
pub mod url;

pub use context::Context;
pub use matcher::{
    lazy, page, redirect, redirect_to, switch, with_context, LoadError, Loader, Matcher, MatcherNode, Meta,
    PageBuilder, RouteRequest, SwitchBuilder,
};
pub use params::{deserialize_all, serialize_all, ParamError, ParamSpec, Params, RawParams};
pub use pattern::{Pattern, PatternError, PatternMatch};
pub use resolver::resolve;
pub use route::{Chunk, ChunkKind, Route, RouteStatus};
pub use url::{Url, UrlError};
