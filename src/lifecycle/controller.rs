//! The signal-armed debug endpoint controller.
//!
//! # State Machine
//! ```text
//!          start()                      signal
//! Idle ─────────────→ Running: watching ───────→ serving (one session)
//!  ↑                        ↑                       │
//!  │ stop() / cancellation  └───────────────────────┘ session drained
//!  └──────────────────────────────────────────────────
//! ```
//!
//! Each `start` begins a new run with its own cancellation token. A run
//! waits for the previous run of the same controller to finish before it
//! arms, so two watch loops never overlap and the listen address is only
//! ever owned by one session.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::{validate_config, ConfigError, ProfilerConfig};
use crate::http::routes::{RouteTable, StandardRoutes};
use crate::lifecycle::hooks::{Hook, HookChain};
use crate::lifecycle::session;
use crate::lifecycle::signals::{SignalWatcher, TriggerSignal};
use crate::observability::events::{Event, EventKind, EventSink, TracingSink};

/// Run state of the watch loop.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle = 0,
    /// `start` is publishing a run or `stop` is cancelling one.
    Starting = 1,
    Running = 2,
}

impl From<u8> for RunState {
    fn from(val: u8) -> Self {
        match val {
            1 => RunState::Starting,
            2 => RunState::Running,
            _ => RunState::Idle,
        }
    }
}

/// Cancellation for one run, and a token cancelled once its loop has exited.
struct Epoch {
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl Epoch {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            finished: CancellationToken::new(),
        }
    }

    fn completed() -> Self {
        let epoch = Self::new(CancellationToken::new());
        epoch.cancel.cancel();
        epoch.finished.cancel();
        epoch
    }
}

/// Configuration and collaborators shared by the watch loop and sessions.
pub(crate) struct Shared {
    pub(crate) config: ProfilerConfig,
    pub(crate) hooks: HookChain,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) routes: Arc<dyn RouteTable>,
}

impl Shared {
    pub(crate) fn emit(&self, kind: EventKind, message: &str, attrs: &[(&'static str, String)]) {
        self.events.event(&Event {
            kind,
            message,
            attrs,
        });
    }
}

struct Inner {
    shared: Shared,
    state: AtomicU8,
    epoch: ArcSwap<Epoch>,
}

impl Inner {
    /// Move to `Starting` if no live run exists.
    fn try_begin_start(&self) -> bool {
        loop {
            match self.state.compare_exchange(
                RunState::Idle as u8,
                RunState::Starting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                // The last run ended on its own (parent token cancelled or
                // the signal could not be subscribed); take over its slot.
                Err(current)
                    if RunState::from(current) == RunState::Running
                        && self.epoch.load().finished.is_cancelled() =>
                {
                    if self
                        .state
                        .compare_exchange(
                            RunState::Running as u8,
                            RunState::Starting as u8,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
                    {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
    }
}

/// Arms a debug HTTP endpoint whenever the configured signal arrives.
///
/// Cloning gives another handle to the same controller.
#[derive(Clone)]
pub struct Profiler {
    inner: Arc<Inner>,
}

impl Profiler {
    /// Build a profiler with the default hooks, event sink and routes.
    pub fn new(config: ProfilerConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ProfilerConfig) -> ProfilerBuilder {
        ProfilerBuilder::new(config)
    }

    /// Configured listen address of the debug endpoint.
    pub fn address(&self) -> &str {
        &self.inner.shared.config.address
    }

    pub fn signal(&self) -> TriggerSignal {
        self.inner.shared.config.signal
    }

    pub fn timeout(&self) -> Duration {
        self.inner.shared.config.timeout()
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.inner.shared.config
    }

    /// Whether a watch loop is live.
    pub fn is_running(&self) -> bool {
        RunState::from(self.inner.state.load(Ordering::SeqCst)) == RunState::Running
            && !self.inner.epoch.load().finished.is_cancelled()
    }

    /// Start the signal handler on the current Tokio runtime.
    ///
    /// Returns immediately. Calls made while already running do nothing and
    /// return `false`. Without a current runtime an error event is emitted
    /// and nothing starts.
    pub fn start(&self) -> bool {
        self.launch(CancellationToken::new())
    }

    /// Like [`start`](Self::start), but the run also ends when `parent` is
    /// cancelled.
    pub fn start_with(&self, parent: &CancellationToken) -> bool {
        self.launch(parent.child_token())
    }

    /// Ask the signal handler to stop.
    ///
    /// Returns immediately; an in-flight session shuts down without waiting
    /// out its timeout. Calls made while not running do nothing and return
    /// `false`.
    pub fn stop(&self) -> bool {
        // Hold the slot as `Starting` so no `start` can swap the epoch
        // between reading it and cancelling it.
        if self
            .inner
            .state
            .compare_exchange(
                RunState::Running as u8,
                RunState::Starting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return false;
        }

        let epoch = self.inner.epoch.load_full();
        let live = !epoch.finished.is_cancelled();
        epoch.cancel.cancel();
        self.inner
            .state
            .store(RunState::Idle as u8, Ordering::SeqCst);
        live
    }

    /// Stop, then wait until the watch loop and any in-flight session
    /// (including its `post_shutdown` hooks) have finished.
    pub async fn shutdown(&self) {
        self.stop();
        let epoch = self.inner.epoch.load_full();
        epoch.finished.cancelled().await;
    }

    fn launch(&self, cancel: CancellationToken) -> bool {
        let shared = &self.inner.shared;

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                shared.emit(
                    EventKind::Error,
                    "start profiler signal handler failed",
                    &[("err", err.to_string())],
                );
                return false;
            }
        };

        if !self.inner.try_begin_start() {
            return false;
        }

        let previous = self.inner.epoch.load_full();
        let epoch = Arc::new(Epoch::new(cancel));
        self.inner.epoch.store(epoch.clone());
        self.inner
            .state
            .store(RunState::Running as u8, Ordering::SeqCst);

        runtime.spawn(watch(self.inner.clone(), epoch, previous));
        true
    }
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("config", &self.inner.shared.config)
            .field("hooks", &self.inner.shared.hooks)
            .field(
                "state",
                &RunState::from(self.inner.state.load(Ordering::SeqCst)),
            )
            .finish()
    }
}

enum Wake {
    Cancelled,
    Signal,
    Closed,
}

/// The watch loop of one run.
async fn watch(inner: Arc<Inner>, epoch: Arc<Epoch>, previous: Arc<Epoch>) {
    let _finished = epoch.finished.clone().drop_guard();
    let shared = &inner.shared;
    let signal = shared.config.signal;

    previous.finished.cancelled().await;

    shared.emit(
        EventKind::Info,
        "start profiler signal handler",
        &[("signal", signal.to_string())],
    );

    let mut watcher = SignalWatcher::new(signal);
    loop {
        if let Err(err) = watcher.subscribe() {
            shared.emit(
                EventKind::Error,
                "subscribe to signal",
                &[("signal", signal.to_string()), ("err", err.to_string())],
            );
            break;
        }
        shared.emit(
            EventKind::Debug,
            "signal handler armed",
            &[("signal", signal.to_string())],
        );

        let wake = tokio::select! {
            biased;
            _ = epoch.cancel.cancelled() => Wake::Cancelled,
            received = watcher.recv() => match received {
                Some(()) => Wake::Signal,
                None => Wake::Closed,
            },
        };

        // No deliveries while a session owns the endpoint.
        watcher.unsubscribe();

        match wake {
            Wake::Cancelled => break,
            Wake::Closed => {
                shared.emit(
                    EventKind::Error,
                    "signal stream closed",
                    &[("signal", signal.to_string())],
                );
                break;
            }
            Wake::Signal => {
                shared.emit(
                    EventKind::Debug,
                    "signal received",
                    &[("signal", signal.to_string())],
                );
                session::run(shared, &epoch.cancel).await;

                if epoch.cancel.is_cancelled() {
                    break;
                }
            }
        }
    }

    shared.emit(
        EventKind::Info,
        "stop profiler signal handler",
        &[("signal", signal.to_string())],
    );
}

/// Assembles a [`Profiler`]. Nothing can be changed after [`build`](Self::build).
pub struct ProfilerBuilder {
    config: ProfilerConfig,
    hooks: Vec<Arc<dyn Hook>>,
    events: Option<Arc<dyn EventSink>>,
    routes: Option<Arc<dyn RouteTable>>,
}

impl ProfilerBuilder {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            hooks: Vec::new(),
            events: None,
            routes: None,
        }
    }

    /// Append a hook. Hooks run in the order they were added.
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn hooks(mut self, hooks: impl IntoIterator<Item = Arc<dyn Hook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Receiver of lifecycle events. Defaults to [`TracingSink`].
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Routes mounted while serving. Defaults to [`StandardRoutes`].
    pub fn routes(mut self, routes: Arc<dyn RouteTable>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Validate the configuration and build the profiler.
    pub fn build(self) -> Result<Profiler, ConfigError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;

        let shared = Shared {
            config: self.config,
            hooks: HookChain::new(self.hooks),
            events: self.events.unwrap_or_else(|| Arc::new(TracingSink)),
            routes: self
                .routes
                .unwrap_or_else(|| Arc::new(StandardRoutes::new())),
        };

        Ok(Profiler {
            inner: Arc::new(Inner {
                shared,
                state: AtomicU8::new(RunState::Idle as u8),
                epoch: ArcSwap::from_pointee(Epoch::completed()),
            }),
        })
    }
}
