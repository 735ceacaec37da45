//! Site crawling over whole trees.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use waypoint::crawler::{crawl, CrawlConfig};
use waypoint::routing::pattern::Pattern;
use waypoint::routing::{page, redirect_to, switch, Context, LoadError, Loader, ParamSpec, RawParams};

mod common;

#[tokio::test]
async fn test_home_about_go_sitemap() {
    let tree = common::home_about_go();
    let map = crawl(&tree, "/", &Context::new(), &CrawlConfig::default()).await;

    let titles: BTreeMap<&str, Option<&str>> = map
        .routes
        .iter()
        .map(|(k, v)| (k.as_str(), v.title.as_deref()))
        .collect();
    assert_eq!(
        titles,
        BTreeMap::from([("/", Some("Home")), ("/about/", Some("About"))])
    );
    assert_eq!(
        map.redirects,
        BTreeMap::from([("/go/".to_string(), "/about/".to_string())])
    );
    assert!(map.errors.is_empty());
}

#[tokio::test]
async fn test_literal_leaves_are_each_resolved_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = common::literal_leaves(25, calls.clone());

    let mut config = CrawlConfig::default();
    config.concurrency = 8;
    let map = crawl(&tree, "/", &Context::new(), &config).await;

    assert_eq!(map.routes.len(), 25);
    assert_eq!(calls.load(Ordering::SeqCst), 25);
    assert!(map.routes.contains_key("/page-0/"));
    assert!(map.routes.contains_key("/page-24/"));
}

#[tokio::test]
async fn test_nested_switch_without_index_is_still_expanded() {
    let tree = switch()
        .child("/", page().title("Home").build())
        .child(
            "/docs",
            switch()
                .child("/intro", page().title("Intro").build())
                .child("/setup", page().title("Setup").build())
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let map = crawl(&tree, "/", &Context::new(), &CrawlConfig::default()).await;

    let keys: Vec<&str> = map.routes.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["/", "/docs/intro/", "/docs/setup/"]);
    assert!(!map.contains("/docs/"));
}

#[tokio::test]
async fn test_parameterized_children_need_an_expander() {
    let tree = switch()
        .child("/", page().title("Blog").build())
        .child(
            "/posts",
            switch()
                .param(ParamSpec::string("slug").required())
                .child("/:slug", page().title("Post").build())
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let map = crawl(&tree, "/", &Context::new(), &CrawlConfig::default()).await;
    assert_eq!(map.routes.len(), 1);

    let config = CrawlConfig::default().with_expander(|mount: &str, pattern: &Pattern| {
        if mount != "/posts/" || !pattern.param_names().contains("slug") {
            return Vec::new();
        }
        ["first", "second"]
            .iter()
            .map(|slug| RawParams::from([("slug".to_string(), slug.to_string())]))
            .collect()
    });
    let map = crawl(&tree, "/", &Context::new(), &config).await;

    let keys: Vec<&str> = map.routes.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["/", "/posts/first/", "/posts/second/"]);
}

#[tokio::test]
async fn test_index_beside_slug_sibling_is_crawled() {
    let tree = switch()
        .param(ParamSpec::string("slug").required())
        .child("/", page().title("Blog").build())
        .child("/:slug", page().title("Post").build())
        .build()
        .unwrap();

    let config = CrawlConfig::default().with_expander(|_: &str, _: &Pattern| {
        vec![RawParams::from([("slug".to_string(), "hello".to_string())])]
    });
    let map = crawl(&tree, "/", &Context::new(), &config).await;

    assert_eq!(map.routes.get("/").and_then(|r| r.title.as_deref()), Some("Blog"));
    assert_eq!(map.routes.get("/hello/").and_then(|r| r.title.as_deref()), Some("Post"));
}

#[tokio::test]
async fn test_redirect_entry_drops_target_query() {
    let tree = switch()
        .child("/about", page().title("About").build())
        .child("/go", redirect_to("/about?ref=go"))
        .build()
        .unwrap();

    let map = crawl(&tree, "/go", &Context::new(), &CrawlConfig::default()).await;

    assert_eq!(map.redirects.get("/go/").map(String::as_str), Some("/about/"));
    assert!(map.routes.contains_key("/about/"));
}

#[tokio::test]
async fn test_redirect_targets_are_crawled_once() {
    let tree = switch()
        .child("/", page().title("Home").build())
        .child("/old", redirect_to("/hidden"))
        .child("/older", redirect_to("/old"))
        .child(
            "/secret",
            switch()
                .child("/hidden", page().title("Hidden").build())
                .build()
                .unwrap(),
        )
        .child("/hidden", page().title("Found via redirect").build())
        .build()
        .unwrap();

    let map = crawl(&tree, "/", &Context::new(), &CrawlConfig::default()).await;

    assert_eq!(map.redirects.get("/old/").map(String::as_str), Some("/hidden/"));
    assert_eq!(map.redirects.get("/older/").map(String::as_str), Some("/old/"));
    assert_eq!(
        map.routes.get("/hidden/").and_then(|r| r.title.as_deref()),
        Some("Found via redirect")
    );
    for pathname in map.redirects.keys() {
        assert!(!map.routes.contains_key(pathname));
    }
}

#[tokio::test]
async fn test_max_pages_and_predicate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = common::literal_leaves(10, calls.clone());

    let mut config = CrawlConfig::default().with_predicate(|p| p == "/" || p.ends_with("-1/") || p.ends_with("-2/"));
    config.concurrency = 1;
    let map = crawl(&tree, "/", &Context::new(), &config).await;
    assert_eq!(map.routes.len(), 2);

    let mut config = CrawlConfig::default();
    config.max_pages = 4;
    config.concurrency = 1;
    let map = crawl(&tree, "/", &Context::new(), &config).await;
    // The root itself is not a page but still counts against the limit.
    assert_eq!(map.routes.len(), 3);
}

#[tokio::test]
async fn test_failures_and_timeouts_are_recorded() {
    let never = Arc::new(Notify::new());
    let tree = switch()
        .child("/", page().title("Home").build())
        .child(
            "/broken",
            page()
                .content_with(Loader::from_fn(|_| async { Err(LoadError::new("boom")) }))
                .build(),
        )
        .child("/hung", common::gated_page("Hung", never))
        .build()
        .unwrap();

    let mut config = CrawlConfig::default();
    config.page_timeout = Some(Duration::from_millis(100));
    let map = crawl(&tree, "/", &Context::new(), &config).await;

    assert_eq!(map.errors.get("/broken/").map(String::as_str), Some("boom"));
    assert!(map.errors.get("/hung/").is_some_and(|m| m.contains("timed out")));
    assert!(map.routes.contains_key("/"));
}

#[tokio::test]
async fn test_sitemap_serializes() {
    let map = crawl(&common::home_about_go(), "/", &Context::new(), &CrawlConfig::default()).await;
    let value = serde_json::to_value(&map).unwrap();

    assert_eq!(value["routes"]["/about/"]["title"], "About");
    assert_eq!(value["redirects"]["/go/"], "/about/");
}
