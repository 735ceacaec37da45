//! Resolution results: routes and the chunks they are made of.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::context::Context;
use crate::routing::matcher::Meta;
use crate::routing::params::Params;
use crate::routing::url::Url;

/// Outcome of a resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Ready,
    Busy,
    Error,
    NotFound,
    Redirect,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Ready => "ready",
            RouteStatus::Busy => "busy",
            RouteStatus::Error => "error",
            RouteStatus::NotFound => "notfound",
            RouteStatus::Redirect => "redirect",
        }
    }
}

/// Payload of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChunkKind {
    Title { title: String },
    Head { meta: Meta },
    Data { data: Value },
    Content { content: Value },
    Error { message: String },
    Redirect { to: String },
}

/// One fragment of a resolved route, tagged with the mount pathname of the
/// node that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub pathname: String,
    #[serde(flatten)]
    pub kind: ChunkKind,
}

impl Chunk {
    pub fn new(pathname: impl Into<String>, kind: ChunkKind) -> Self {
        Self {
            pathname: pathname.into(),
            kind,
        }
    }
}

/// A fully resolved route. Never mutated once handed out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub url: Url,
    pub status: RouteStatus,
    pub chunks: Vec<Chunk>,
    pub params: Params,
    pub context: Context,
}

impl Route {
    /// Placeholder shown while the first resolution for `url` is in flight.
    pub fn busy(url: Url, context: Context) -> Self {
        Self {
            url,
            status: RouteStatus::Busy,
            chunks: Vec::new(),
            params: Params::new(),
            context,
        }
    }

    /// A route that failed outside of any node, e.g. a redirect loop.
    pub fn failed(url: Url, context: Context, message: impl Into<String>) -> Self {
        let chunk = Chunk::new(url.canonical_pathname(), ChunkKind::Error {
            message: message.into(),
        });
        Self {
            url,
            status: RouteStatus::Error,
            chunks: vec![chunk],
            params: Params::new(),
            context,
        }
    }

    /// The deepest title chunk.
    pub fn title(&self) -> Option<&str> {
        self.chunks.iter().rev().find_map(|c| match &c.kind {
            ChunkKind::Title { title } => Some(title.as_str()),
            _ => None,
        })
    }

    /// All head chunks merged; deeper nodes override shallower ones.
    pub fn meta(&self) -> Meta {
        self.chunks
            .iter()
            .filter_map(|c| match &c.kind {
                ChunkKind::Head { meta } => Some(meta),
                _ => None,
            })
            .flat_map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }

    /// The deepest content chunk.
    pub fn content(&self) -> Option<&Value> {
        self.chunks.iter().rev().find_map(|c| match &c.kind {
            ChunkKind::Content { content } => Some(content),
            _ => None,
        })
    }

    /// Data chunks in descent order.
    pub fn data(&self) -> impl Iterator<Item = &Value> {
        self.chunks.iter().filter_map(|c| match &c.kind {
            ChunkKind::Data { data } => Some(data),
            _ => None,
        })
    }

    /// The first error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.chunks.iter().find_map(|c| match &c.kind {
            ChunkKind::Error { message } => Some(message.as_str()),
            _ => None,
        })
    }

    /// Target of the terminating redirect chunk.
    pub fn redirect_target(&self) -> Option<&str> {
        match self.chunks.last().map(|c| &c.kind) {
            Some(ChunkKind::Redirect { to }) => Some(to.as_str()),
            _ => None,
        }
    }
}
