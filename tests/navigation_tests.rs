//! Navigation state machine: supersession, redirects, steadiness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use waypoint::config::NavigationConfig;
use waypoint::lifecycle::Shutdown;
use waypoint::navigation::{MemoryHistory, Navigation};
use waypoint::routing::{page, redirect_to, switch, Context, Matcher, RouteStatus};

mod common;
use common::url;

fn start(tree: Matcher, initial: &str, shutdown: &Shutdown) -> Navigation {
    Navigation::spawn(
        tree,
        url(initial),
        Context::new(),
        &NavigationConfig::default(),
        shutdown.subscribe(),
    )
}

#[tokio::test]
async fn test_initial_route_is_busy_until_settled() {
    let gate = Arc::new(Notify::new());
    let tree = switch()
        .child("/", common::gated_page("Home", gate.clone()))
        .build()
        .unwrap();
    let shutdown = Shutdown::new();
    let nav = start(tree, "/", &shutdown);

    assert_eq!(nav.current().status, RouteStatus::Busy);
    assert!(!nav.is_steady());

    gate.notify_one();
    let route = nav.steady().await;
    assert_eq!(route.status, RouteStatus::Ready);
    assert_eq!(route.title(), Some("Home"));
    assert!(nav.is_steady());
}

#[tokio::test]
async fn test_stale_resolution_is_never_observed() {
    let slow_gate = Arc::new(Notify::new());
    let tree = switch()
        .child("/", page().title("Home").build())
        .child("/slow", common::gated_page("Slow", slow_gate.clone()))
        .child("/fast", page().title("Fast").build())
        .build()
        .unwrap();
    let shutdown = Shutdown::new();
    let nav = start(tree, "/", &shutdown);
    nav.steady().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    nav.subscribe(move |route| {
        sink.lock().unwrap().push(route.title().unwrap_or_default().to_string());
    });

    let g1 = nav.navigate(url("/slow"));
    // Give the driver time to start the slow resolution before superseding it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let g2 = nav.navigate(url("/fast"));
    assert!(g2 > g1);

    let route = nav.steady().await;
    assert_eq!(route.title(), Some("Fast"));

    // Let the superseded resolution finish; it must be discarded.
    slow_gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(nav.current().title(), Some("Fast"));
    assert_eq!(nav.current_url(), url("/fast/"));
    assert_eq!(*seen.lock().unwrap(), vec!["Fast".to_string()]);
}

#[tokio::test]
async fn test_current_route_unchanged_while_pending() {
    let gate = Arc::new(Notify::new());
    let tree = switch()
        .child("/", page().title("Home").build())
        .child("/pending", common::gated_page("Pending", gate.clone()))
        .build()
        .unwrap();
    let shutdown = Shutdown::new();
    let nav = start(tree, "/", &shutdown);
    nav.steady().await;

    nav.navigate(url("/pending"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(nav.current().title(), Some("Home"));
    assert!(!nav.is_steady());

    gate.notify_one();
    assert_eq!(nav.steady().await.title(), Some("Pending"));
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let shutdown = Shutdown::new();
    let nav = start(common::home_about_go(), "/go", &shutdown);

    let route = nav.steady().await;
    assert_eq!(route.status, RouteStatus::Ready);
    assert_eq!(route.title(), Some("About"));
    assert_eq!(nav.current_url(), url("/about/"));
}

#[tokio::test]
async fn test_redirect_cycle_ends_in_loop_error() {
    let tree = switch()
        .child("/a", redirect_to("/b"))
        .child("/b", redirect_to("/a"))
        .build()
        .unwrap();
    let shutdown = Shutdown::new();
    let nav = start(tree, "/a", &shutdown);

    let route = tokio::time::timeout(Duration::from_secs(5), nav.steady())
        .await
        .expect("redirect cycle must not hang");
    assert_eq!(route.status, RouteStatus::Error);
    assert!(route.error().unwrap().contains("redirect loop"));
}

#[tokio::test]
async fn test_unsubscribed_callback_is_not_called() {
    let shutdown = Shutdown::new();
    let nav = start(common::home_about_go(), "/", &shutdown);
    nav.steady().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = nav.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    nav.navigate(url("/about"));
    nav.steady().await;
    assert!(nav.unsubscribe(id));
    nav.navigate(url("/"));
    nav.steady().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!nav.unsubscribe(id));
}

#[tokio::test]
async fn test_set_context_refreshes_current_location() {
    let tree = switch()
        .child(
            "/",
            page()
                .title_with(waypoint::routing::Loader::from_fn(|req| async move {
                    Ok(req.context.get("lang").and_then(|v| v.as_str()).unwrap_or("en").to_string())
                }))
                .build(),
        )
        .build()
        .unwrap();
    let shutdown = Shutdown::new();
    let nav = start(tree, "/", &shutdown);
    assert_eq!(nav.steady().await.title(), Some("en"));

    nav.set_context(Context::new().with("lang", "fr"));
    assert_eq!(nav.steady().await.title(), Some("fr"));
}

#[tokio::test]
async fn test_set_context_right_after_navigate_keeps_new_location() {
    let shutdown = Shutdown::new();
    let nav = start(common::home_about_go(), "/", &shutdown);
    assert_eq!(nav.steady().await.title(), Some("Home"));

    nav.navigate(url("/about"));
    nav.set_context(Context::new().with("lang", "fr"));

    let route = nav.steady().await;
    assert_eq!(route.title(), Some("About"));
    assert_eq!(route.context, Context::new().with("lang", "fr"));
}

#[tokio::test]
async fn test_refresh_reloads_latest_requested_location() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = switch()
        .child("/", page().title("Home").build())
        .child("/counted", common::counting_page("Counted", calls.clone()))
        .build()
        .unwrap();
    let shutdown = Shutdown::new();
    let nav = start(tree, "/", &shutdown);
    nav.steady().await;

    nav.navigate(url("/counted"));
    nav.refresh();
    let route = nav.steady().await;
    assert_eq!(route.title(), Some("Counted"));

    let before = calls.load(Ordering::SeqCst);
    assert!(before >= 1);
    nav.refresh();
    let route = nav.steady().await;
    assert_eq!(route.title(), Some("Counted"));
    assert_eq!(calls.load(Ordering::SeqCst), before + 1);
}

#[tokio::test]
async fn test_history_events_drive_navigation() {
    let shutdown = Shutdown::new();
    let history = MemoryHistory::new(url("/"));
    let nav = start(common::home_about_go(), "/", &shutdown);
    let forwarder = nav.attach(history.listen());

    history.push(url("/about"));
    history.push(url("/unknown"));
    history.back();
    drop(history);
    forwarder.await.unwrap();

    let route = nav.steady().await;
    assert_eq!(route.title(), Some("About"));
}

#[tokio::test]
async fn test_shutdown_stops_driver() {
    let gate = Arc::new(Notify::new());
    let tree = switch()
        .child("/", common::gated_page("Never", gate))
        .build()
        .unwrap();
    let shutdown = Shutdown::new();
    let nav = start(tree, "/", &shutdown);

    shutdown.trigger();
    let route = tokio::time::timeout(Duration::from_secs(5), nav.steady())
        .await
        .expect("steady must return once the driver stopped");
    assert_eq!(route.status, RouteStatus::Busy);
}
