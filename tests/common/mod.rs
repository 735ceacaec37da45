//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Notify;
use waypoint::routing::{page, redirect_to, switch, Loader, Matcher, Url};

pub fn url(input: &str) -> Url {
    Url::parse(input).unwrap()
}

/// `/` Home, `/about` About, `/go` redirecting to `/about`.
pub fn home_about_go() -> Matcher {
    switch()
        .child("/", page().title("Home").build())
        .child("/about", page().title("About").build())
        .child("/go", redirect_to("/about"))
        .build()
        .unwrap()
}

/// A page whose content loader counts its invocations.
pub fn counting_page(title: &str, calls: Arc<AtomicUsize>) -> Matcher {
    page()
        .title(title)
        .content_with(Loader::from_fn(move |req| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "path": req.pathname }))
            }
        }))
        .build()
}

/// A page whose content only loads once `gate` is notified.
pub fn gated_page(title: &str, gate: Arc<Notify>) -> Matcher {
    page()
        .title(title)
        .content_with(Loader::from_fn(move |_| {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(json!("released"))
            }
        }))
        .build()
}

/// A switch with `n` literal leaf pages `/page-0` .. `/page-{n-1}`, each
/// counting its resolutions in the shared counter.
pub fn literal_leaves(n: usize, calls: Arc<AtomicUsize>) -> Matcher {
    (0..n)
        .fold(switch(), |builder, i| {
            builder.child(format!("/page-{i}"), counting_page(&format!("Page {i}"), calls.clone()))
        })
        .build()
        .unwrap()
}
