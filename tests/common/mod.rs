//! Shared utilities for the lifecycle integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use signal_profiler::{
    Event, EventKind, EventSink, Hook, Profiler, ProfilerConfig, RouteTable, TriggerSignal,
};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub kind: EventKind,
    pub message: String,
    pub attrs: Vec<(String, String)>,
}

/// Event sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

impl EventSink for RecordingSink {
    fn event(&self, event: &Event<'_>) {
        self.events.lock().unwrap().push(Recorded {
            kind: event.kind,
            message: event.message.to_string(),
            attrs: event
                .attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
    }
}

impl RecordingSink {
    pub fn all(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EventKind, message: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind && e.message == message)
            .count()
    }

    /// Wait until `message` has been seen at least `n` times.
    pub async fn wait_for(&self, kind: EventKind, message: &str, n: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.count(kind, message) >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count(kind, message) >= n
    }

    /// Wait until the watch loop has (re)subscribed `n` times in total.
    pub async fn wait_armed(&self, n: usize) {
        assert!(
            self.wait_for(EventKind::Debug, "signal handler armed", n, Duration::from_secs(5))
                .await,
            "signal handler was not armed {n} time(s)"
        );
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HookFlags {
    pub pre_started: bool,
    pub post_shutdown: bool,
}

/// Hook that records its calls behind a lock, optionally slowing `pre_start`.
#[derive(Default)]
pub struct FlagHook {
    flags: Mutex<HookFlags>,
    pre_calls: AtomicUsize,
    post_calls: AtomicUsize,
    pre_start_delay: Option<Duration>,
}

impl FlagHook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pre_start_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn flags(&self) -> HookFlags {
        *self.flags.lock().unwrap()
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.pre_calls.load(Ordering::SeqCst),
            self.post_calls.load(Ordering::SeqCst),
        )
    }

    pub async fn wait_post_shutdown(&self, calls: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.calls().1 >= calls {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.calls().1 >= calls
    }
}

impl Hook for FlagHook {
    fn pre_start(&self) {
        if let Some(delay) = self.pre_start_delay {
            std::thread::sleep(delay);
        }
        let mut flags = self.flags.lock().unwrap();
        flags.pre_started = true;
        flags.post_shutdown = false;
        self.pre_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn post_shutdown(&self) {
        let mut flags = self.flags.lock().unwrap();
        flags.post_shutdown = true;
        self.post_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A local address that was free a moment ago.
pub fn free_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    format!("127.0.0.1:{port}")
}

pub fn send(signal: Signal) {
    kill(Pid::this(), signal).unwrap();
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

/// Poll `url` until it answers, or give up after `within`.
pub async fn get_when_up(client: &reqwest::Client, url: &str, within: Duration) -> reqwest::Response {
    let deadline = Instant::now() + within;
    loop {
        match client.get(url).send().await {
            Ok(res) => return res,
            Err(err) if Instant::now() >= deadline => panic!("{url} never came up: {err}"),
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
}

pub struct Harness {
    pub profiler: Profiler,
    pub events: Arc<RecordingSink>,
    pub hook: Arc<FlagHook>,
    pub address: String,
}

impl Harness {
    pub fn new(signal: TriggerSignal, timeout_secs: u64) -> Self {
        Self::with(signal, timeout_secs, FlagHook::new(), None)
    }

    pub fn with(
        signal: TriggerSignal,
        timeout_secs: u64,
        hook: Arc<FlagHook>,
        routes: Option<Arc<dyn RouteTable>>,
    ) -> Self {
        let address = free_address();
        let events = Arc::new(RecordingSink::default());
        let config = ProfilerConfig {
            signal,
            address: address.clone(),
            timeout_secs,
            ..ProfilerConfig::default()
        };

        let mut builder = Profiler::builder(config)
            .event_sink(events.clone())
            .hook(hook.clone());
        if let Some(routes) = routes {
            builder = builder.routes(routes);
        }

        Self {
            profiler: builder.build().unwrap(),
            events,
            hook,
            address,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }
}
