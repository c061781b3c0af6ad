//! One debug endpoint session.
//!
//! ```text
//! pre_start hooks → bind → serve ─┬─ timeout elapsed ─┬→ graceful shutdown (≤ timeout)
//!                                 └─ cancelled ───────┘   → force close past the deadline
//!                                                          → post_shutdown hooks
//! ```
//!
//! Every session that ran its `pre_start` hooks runs the `post_shutdown`
//! hooks exactly once, whether the listener bound or not.

use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::http::server::DebugServer;
use crate::lifecycle::controller::Shared;
use crate::net::listener::{self, ListenerError};
use crate::observability::events::EventKind;
use crate::observability::metrics;

/// Failures contained within a session. They are reported as events and
/// never reach the caller of `start`.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("debug server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("graceful shutdown exceeded {0:?}")]
    ShutdownTimeout(Duration),

    #[error("debug server task failed: {0}")]
    Task(#[from] JoinError),
}

/// Run one session to completion.
///
/// Returns only after the server task has fully stopped and the
/// `post_shutdown` hooks have run.
pub(crate) async fn run(shared: &Shared, cancel: &CancellationToken) {
    let address = shared.config.address.as_str();

    shared.emit(
        EventKind::Info,
        "start debug endpoint",
        &[("address", address.to_string())],
    );
    metrics::record_session_started();

    shared.hooks.pre_start(shared.events.as_ref());

    if cancel.is_cancelled() {
        shared.emit(
            EventKind::Debug,
            "debug endpoint cancelled before start",
            &[("address", address.to_string())],
        );
    } else {
        match listener::bind(address).await.map_err(EndpointError::from) {
            Ok(listener) => {
                let server = DebugServer::new(shared.routes.as_ref(), shared.config.request_timeout());
                let shutdown = CancellationToken::new();
                let force = CancellationToken::new();
                let task = server.spawn(listener, shutdown.clone(), force.clone());

                metrics::record_endpoint_active(true);
                let result = serve(shared, task, &shutdown, &force, cancel).await;
                metrics::record_endpoint_active(false);

                match result {
                    Ok(()) => {}
                    Err(err @ EndpointError::ShutdownTimeout(_)) => {
                        metrics::record_shutdown_timeout();
                        shared.emit(
                            EventKind::Error,
                            "shutdown debug endpoint",
                            &[("err", err.to_string())],
                        );
                    }
                    Err(err) => {
                        shared.emit(
                            EventKind::Error,
                            "serve debug endpoint",
                            &[("err", err.to_string())],
                        );
                    }
                }
                shared.emit(EventKind::Info, "debug endpoint stopped", &[]);
            }
            Err(err) => {
                metrics::record_bind_failure();
                shared.emit(
                    EventKind::Error,
                    "start debug endpoint",
                    &[("err", err.to_string())],
                );
            }
        }
    }

    shared.hooks.post_shutdown(shared.events.as_ref());
}

/// Race the serving window against cancellation, then drain.
async fn serve(
    shared: &Shared,
    mut task: JoinHandle<std::io::Result<()>>,
    shutdown: &CancellationToken,
    force: &CancellationToken,
    cancel: &CancellationToken,
) -> Result<(), EndpointError> {
    let timeout = shared.config.timeout();

    let stopped_early = tokio::select! {
        _ = tokio::time::sleep(timeout) => None,
        _ = cancel.cancelled() => None,
        result = &mut task => Some(result),
    };

    // The server ended on its own; there is nothing left to drain.
    if let Some(result) = stopped_early {
        return flatten(result);
    }

    shared.emit(
        EventKind::Info,
        "shutdown debug endpoint",
        &[
            ("address", shared.config.address.clone()),
            ("timeout", format!("{timeout:?}")),
        ],
    );
    shutdown.cancel();

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(result) => flatten(result),
        Err(_) => {
            // Open connections are aborted; the task ends once they are gone.
            force.cancel();
            flatten(task.await)?;
            Err(EndpointError::ShutdownTimeout(timeout))
        }
    }
}

fn flatten(result: Result<std::io::Result<()>, JoinError>) -> Result<(), EndpointError> {
    result?.map_err(EndpointError::Serve)
}
