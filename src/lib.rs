//! Route resolution and site crawling engine.
//!
//! Applications describe their URL space as an immutable matcher tree
//! ([`routing`]), resolve URLs against it asynchronously, keep a single
//! current route under rapid re-navigation ([`navigation`]), and enumerate
//! every statically reachable page ([`crawler`]).

pub mod config;
pub mod crawler;
pub mod lifecycle;
pub mod navigation;
pub mod observability;
pub mod routing;

pub use config::schema::WaypointConfig;
pub use crawler::{crawl, CrawlConfig, SiteMap};
pub use lifecycle::Shutdown;
pub use navigation::{MemoryHistory, Navigation};
pub use routing::{resolve, Matcher, Route, RouteStatus, Url};
