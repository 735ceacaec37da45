//! Navigation state machine.
//!
//! # Data Flow
//! ```text
//! navigate(url) / history events (attach)
//!     → generation += 1 (watch channel, visible to every handle at once)
//!     → Command → driver task
//!     → resolve() pushed onto the in-flight set
//!     → settles: generation still current?
//!         no  → discard (superseded)
//!         yes → redirect? → successor generation for the target (hop + 1)
//!               else      → store route (ArcSwap), notify subscribers, mark settled
//! ```
//!
//! # Design Decisions
//! - A single driver task owns resolution state; handles only bump counters
//!   and send commands, so "current" is written from exactly one place
//! - Stale resolutions run to completion and are dropped; nothing is aborted
//! - The generation check in `apply` is the linearization point: a route is
//!   published only if its generation was still the latest just before the
//!   store. A request racing past that check supersedes it immediately after
//! - Subscribers are called synchronously from the driver, in subscription
//!   order, with no registry lock held (callbacks may unsubscribe)
//! - The driver stops on the shutdown broadcast or once every handle is gone;
//!   after that `steady()` returns immediately

pub mod history;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::NavigationConfig;
use crate::observability::metrics;
use crate::routing::{resolve, Context, Matcher, Route, RouteStatus, Url};

pub use history::MemoryHistory;

/// Handle returned by [`Navigation::subscribe`].
pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn(&Route) + Send + Sync>;

/// Failures the state machine reports as error routes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("redirect loop: gave up after {hops} redirects at '{url}'")]
    RedirectLoop { hops: u32, url: String },

    #[error("invalid redirect target '{target}': {reason}")]
    InvalidRedirect { target: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default)]
struct Generations {
    requested: u64,
    settled: u64,
    stopped: bool,
}

impl Generations {
    fn is_steady(&self) -> bool {
        self.stopped || self.settled == self.requested
    }
}

enum Command {
    Navigate { url: Url, generation: u64 },
    Refresh { generation: u64 },
    SetContext { context: Context, generation: u64 },
}

struct Shared {
    current: ArcSwap<Route>,
    generations: watch::Sender<Generations>,
    subscribers: DashMap<SubscriptionId, Callback>,
    next_subscription: AtomicU64,
}

impl Shared {
    fn requested(&self) -> u64 {
        self.generations.borrow().requested
    }

    fn bump(&self) -> u64 {
        let mut next = 0;
        self.generations.send_modify(|g| {
            g.requested += 1;
            next = g.requested;
        });
        next
    }

    /// Start a successor of `expected`, unless a newer generation already exists.
    fn bump_if_current(&self, expected: u64) -> Option<u64> {
        let mut next = None;
        self.generations.send_if_modified(|g| {
            if g.requested != expected {
                return false;
            }
            g.requested += 1;
            next = Some(g.requested);
            true
        });
        next
    }
}

/// Cloneable handle to a running navigation state machine.
#[derive(Clone)]
pub struct Navigation {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Navigation {
    /// Spawn the driver task and start resolving `initial`.
    ///
    /// Until the first resolution settles, [`current`](Self::current) is a
    /// `Busy` placeholder for `initial`. Must be called within a Tokio runtime.
    pub fn spawn(
        tree: Matcher,
        initial: Url,
        context: Context,
        config: &NavigationConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (generations, _) = watch::channel(Generations::default());

        let shared = Arc::new(Shared {
            current: ArcSwap::from_pointee(Route::busy(initial.canonicalized(), context.clone())),
            generations,
            subscribers: DashMap::new(),
            next_subscription: AtomicU64::new(1),
        });

        let driver = Driver {
            tree,
            context,
            location: initial.clone(),
            max_hops: config.max_redirect_hops,
            shared: shared.clone(),
            commands: receiver,
            in_flight: FuturesUnordered::new(),
        };
        tokio::spawn(driver.run(shutdown));

        let navigation = Self { shared, commands };
        navigation.navigate(initial);
        navigation
    }

    /// Request a navigation. The current route is left untouched until the
    /// resolution for the returned generation settles.
    pub fn navigate(&self, url: Url) -> u64 {
        let generation = self.shared.bump();
        self.send(Command::Navigate { url, generation });
        generation
    }

    /// Re-resolve the most recently requested location.
    pub fn refresh(&self) -> u64 {
        let generation = self.shared.bump();
        self.send(Command::Refresh { generation });
        generation
    }

    /// Replace the resolution context and re-resolve.
    pub fn set_context(&self, context: Context) -> u64 {
        let generation = self.shared.bump();
        self.send(Command::SetContext { context, generation });
        generation
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Navigation driver has stopped; request dropped");
        }
    }

    /// The latest settled route.
    pub fn current(&self) -> Arc<Route> {
        self.shared.current.load_full()
    }

    pub fn current_url(&self) -> Url {
        self.current().url.clone()
    }

    /// The most recently requested generation.
    pub fn generation(&self) -> u64 {
        self.shared.requested()
    }

    pub fn is_steady(&self) -> bool {
        self.shared.generations.borrow().is_steady()
    }

    /// Wait until the latest requested generation has settled, then return
    /// the current route.
    pub async fn steady(&self) -> Arc<Route> {
        let mut rx = self.shared.generations.subscribe();
        let _ = rx.wait_for(Generations::is_steady).await;
        self.current()
    }

    /// Register a callback invoked with every newly applied route.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Route) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.shared.subscribers.insert(id, Arc::new(callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.remove(&id).is_some()
    }

    /// Forward URL-change events from `events` (e.g. [`MemoryHistory::listen`])
    /// as navigations, in arrival order. The forwarder ends when the channel
    /// closes or the driver stops.
    pub fn attach(&self, mut events: mpsc::UnboundedReceiver<Url>) -> JoinHandle<()> {
        let navigation = self.clone();
        tokio::spawn(async move {
            while let Some(url) = events.recv().await {
                if navigation.commands.is_closed() {
                    break;
                }
                navigation.navigate(url);
            }
            tracing::debug!("URL event source detached");
        })
    }
}

struct Settled {
    generation: u64,
    hops: u32,
    route: Route,
}

struct Driver {
    tree: Matcher,
    context: Context,
    location: Url,
    max_hops: u32,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    in_flight: FuturesUnordered<BoxFuture<'static, Settled>>,
}

impl Driver {
    async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(max_redirect_hops = self.max_hops, "Navigation driver started");
        let mut shutdown_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        tracing::debug!("All navigation handles dropped, exiting loop");
                        break;
                    }
                },
                Some(settled) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.settle(settled);
                }
                result = shutdown.recv(), if shutdown_open => match result {
                    Err(broadcast::error::RecvError::Closed) => shutdown_open = false,
                    _ => {
                        tracing::info!("Navigation driver received shutdown signal, exiting loop");
                        break;
                    }
                },
            }
        }

        self.shared.generations.send_modify(|g| g.stopped = true);
    }

    fn handle(&mut self, command: Command) {
        let (url, generation) = match command {
            Command::Navigate { url, generation } => (url, generation),
            Command::Refresh { generation } => (self.location.clone(), generation),
            Command::SetContext { context, generation } => {
                self.context = context;
                (self.location.clone(), generation)
            }
        };

        // Commands arrive in request order, so the location stays current
        // even when the resolution itself is skipped.
        self.location = url.clone();

        if generation < self.shared.requested() {
            tracing::debug!(generation, url = %url, "Skipping navigation superseded before it started");
            metrics::record_superseded();
            return;
        }

        self.start(url, generation, 0);
    }

    fn start(&mut self, url: Url, generation: u64, hops: u32) {
        tracing::debug!(generation, hops, url = %url, "Resolution started");

        let tree = self.tree.clone();
        let context = self.context.clone();
        self.in_flight.push(
            async move {
                let route = resolve(&tree, &url, &context).await;
                Settled { generation, hops, route }
            }
            .boxed(),
        );
    }

    fn settle(&mut self, settled: Settled) {
        let Settled { generation, hops, route } = settled;

        if generation != self.shared.requested() {
            tracing::debug!(generation, url = %route.url, "Discarding superseded resolution");
            metrics::record_superseded();
            return;
        }

        if route.status != RouteStatus::Redirect {
            self.apply(generation, route);
            return;
        }

        let Some(target) = route.redirect_target().map(str::to_string) else {
            self.apply(generation, route);
            return;
        };

        let target_url = match Url::parse(&target) {
            Ok(url) => url,
            Err(e) => {
                let error = NavigationError::InvalidRedirect {
                    target,
                    reason: e.to_string(),
                };
                let failed = Route::failed(route.url.clone(), self.context.clone(), error.to_string());
                self.apply(generation, failed);
                return;
            }
        };

        if hops >= self.max_hops {
            tracing::warn!(hops, from = %route.url, to = %target, "Redirect loop detected");
            metrics::record_redirect_loop();
            let error = NavigationError::RedirectLoop { hops, url: target };
            let failed = Route::failed(target_url, self.context.clone(), error.to_string());
            self.apply(generation, failed);
            return;
        }

        match self.shared.bump_if_current(generation) {
            Some(next) => {
                tracing::debug!(from = %route.url, to = %target_url, hops = hops + 1, "Following redirect");
                self.location = target_url.clone();
                self.start(target_url, next, hops + 1);
            }
            None => metrics::record_superseded(),
        }
    }

    fn apply(&mut self, generation: u64, route: Route) {
        // Last look before publishing: a handle on another thread may have
        // requested a newer generation while this one was being settled.
        if generation != self.shared.requested() {
            tracing::debug!(generation, url = %route.url, "Discarding resolution superseded while settling");
            metrics::record_superseded();
            return;
        }
        tracing::debug!(generation, url = %route.url, status = route.status.as_str(), "Route settled");

        let route = Arc::new(route);
        self.shared.current.store(route.clone());

        let mut callbacks: Vec<(SubscriptionId, Callback)> = self
            .shared
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        callbacks.sort_by_key(|(id, _)| *id);
        for (_, callback) in callbacks {
            callback(&route);
        }

        self.shared
            .generations
            .send_modify(|g| g.settled = g.settled.max(generation));
    }
}
