//! Debug route table.
//!
//! Routes are mounted on a private [`Router`] built fresh for every
//! session. Nothing here touches a process-wide registry, so an unrelated
//! dependency cannot inject a handler into the debug endpoint.
//!
//! # Routes
//! - `/debug/pprof/`: index of the available routes
//! - `/debug/pprof/cmdline`: process arguments, NUL separated
//! - `/debug/pprof/profile`, `/debug/pprof/trace`: integrator supplied, 501 otherwise
//! - `/debug/pprof/symbol`: symbol table size
//! - `/debug/vars`: JSON dump of process facts and published values

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, MethodRouter},
    Json, Router,
};
use dashmap::DashMap;
use serde_json::{Map, Value};

/// Builds the router mounted by one debug endpoint session.
pub trait RouteTable: Send + Sync {
    fn router(&self) -> Router;
}

impl<F> RouteTable for F
where
    F: Fn() -> Router + Send + Sync,
{
    fn router(&self) -> Router {
        self()
    }
}

/// Runtime variables exposed on `/debug/vars`.
///
/// Cloning is cheap; clones share the published values.
#[derive(Clone)]
pub struct Vars {
    published: Arc<DashMap<String, Value>>,
    started: Instant,
}

impl Vars {
    pub fn new() -> Self {
        Self {
            published: Arc::new(DashMap::new()),
            started: Instant::now(),
        }
    }

    /// Publish (or replace) a named value.
    pub fn publish(&self, name: impl Into<String>, value: Value) {
        self.published.insert(name.into(), value);
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.published.remove(name).map(|(_, v)| v)
    }

    /// Published values plus `cmdline`, `pid` and `uptime_seconds`.
    pub fn snapshot(&self) -> Value {
        let mut map = Map::new();
        for entry in self.published.iter() {
            map.insert(entry.key().clone(), entry.value().clone());
        }
        map.insert("cmdline".into(), Value::from(args()));
        map.insert("pid".into(), Value::from(std::process::id()));
        map.insert(
            "uptime_seconds".into(),
            Value::from(self.started.elapsed().as_secs()),
        );
        Value::Object(map)
    }
}

impl Default for Vars {
    fn default() -> Self {
        Self::new()
    }
}

/// The standard introspection routes.
#[derive(Clone, Default)]
pub struct StandardRoutes {
    vars: Vars,
    profile: Option<MethodRouter>,
    trace: Option<MethodRouter>,
    extra: Option<Router>,
}

impl StandardRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// Serve CPU profiles on `/debug/pprof/profile`.
    pub fn with_profile(mut self, handler: MethodRouter) -> Self {
        self.profile = Some(handler);
        self
    }

    /// Serve execution traces on `/debug/pprof/trace`.
    pub fn with_trace(mut self, handler: MethodRouter) -> Self {
        self.trace = Some(handler);
        self
    }

    /// Mount additional routes next to the standard ones.
    ///
    /// The paths must not overlap the standard routes.
    pub fn merge(mut self, router: Router) -> Self {
        self.extra = Some(match self.extra.take() {
            Some(existing) => existing.merge(router),
            None => router,
        });
        self
    }
}

impl RouteTable for StandardRoutes {
    fn router(&self) -> Router {
        let profile = self
            .profile
            .clone()
            .unwrap_or_else(|| get(|| not_registered("CPU profiler")));
        let trace = self
            .trace
            .clone()
            .unwrap_or_else(|| get(|| not_registered("execution tracer")));

        let router = Router::new()
            .route("/debug/pprof/", get(index))
            .route("/debug/pprof/cmdline", get(cmdline))
            .route("/debug/pprof/symbol", get(symbol))
            .route("/debug/vars", get(vars))
            .with_state(self.vars.clone())
            .route("/debug/pprof/profile", profile)
            .route("/debug/pprof/trace", trace);

        match &self.extra {
            Some(extra) => router.merge(extra.clone()),
            None => router,
        }
    }
}

fn args() -> Vec<String> {
    std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

const INDEX_ROUTES: [(&str, &str); 5] = [
    ("cmdline", "The command line invocation of the current program"),
    ("profile", "CPU profile of the current process"),
    ("symbol", "Symbol lookup"),
    ("trace", "Execution trace of the current program"),
    ("../vars", "Process facts and published runtime variables, as JSON"),
];

async fn index() -> Html<String> {
    let mut body = String::from(
        "<html><head><title>/debug/pprof/</title></head><body>\n\
         <p>Types of profiles available:</p>\n<ul>\n",
    );
    for (path, description) in INDEX_ROUTES {
        body.push_str(&format!(
            "<li><a href=\"{path}\">{path}</a>: {description}</li>\n"
        ));
    }
    body.push_str("</ul>\n</body></html>\n");
    Html(body)
}

async fn cmdline() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        args().join("\0"),
    )
}

async fn symbol() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "num_symbols: 0\n",
    )
}

async fn vars(State(vars): State<Vars>) -> Json<Value> {
    Json(vars.snapshot())
}

async fn not_registered(what: &'static str) -> (StatusCode, String) {
    (
        StatusCode::NOT_IMPLEMENTED,
        format!("no {what} registered for this endpoint\n"),
    )
}
