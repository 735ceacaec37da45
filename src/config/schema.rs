//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for waypoint.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::Matcher;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WaypointConfig {
    /// Navigation state machine settings.
    pub navigation: NavigationConfig,

    /// Site crawler settings.
    pub crawler: CrawlerConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Optional declarative matcher tree.
    pub site: Option<SiteDef>,

    /// `site` compiled by the loader.
    #[serde(skip)]
    pub(crate) compiled_site: Option<Matcher>,
}

/// Navigation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Redirects followed for one navigation before giving up with a loop error.
    pub max_redirect_hops: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self { max_redirect_hops: 10 }
    }
}

/// Crawler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Pathname the crawl starts from.
    pub root: String,

    /// Resolutions kept in flight at once.
    pub concurrency: usize,

    /// Upper bound on resolved pathnames.
    pub max_pages: usize,

    /// Per-page deadline. Unset means no deadline.
    pub page_timeout_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
            concurrency: 4,
            max_pages: 10_000,
            page_timeout_secs: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A node of a declarative site tree.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SiteDef {
    Switch {
        title: Option<String>,
        #[serde(default)]
        meta: BTreeMap<String, String>,
        data: Option<Value>,
        content: Option<Value>,
        #[serde(default)]
        params: Vec<ParamDef>,
        #[serde(default)]
        children: BTreeMap<String, SiteDef>,
    },
    Page {
        title: Option<String>,
        #[serde(default)]
        meta: BTreeMap<String, String>,
        content: Option<Value>,
        #[serde(default)]
        params: Vec<ParamDef>,
    },
    Redirect {
        to: String,
    },
}

/// A declared parameter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParamDef {
    pub name: String,

    #[serde(default)]
    pub kind: ParamKind,

    #[serde(default)]
    pub required: bool,

    pub default: Option<Value>,
}

/// Built-in codecs available to declarative sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    String,
    Number,
    Flag,
}
