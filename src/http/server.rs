//! HTTP server for one debug endpoint session.
//!
//! # Responsibilities
//! - Wrap the session's private route table in the middleware stack
//!   (request ID, request timeout, tracing)
//! - Accept connections on a bound listener until told to shut down
//! - Drain in-flight requests on graceful shutdown
//! - Abort whatever is left when forced, and only finish once every
//!   connection task has ended

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::http::routes::RouteTable;

/// The debug HTTP server for a single session.
pub struct DebugServer {
    app: Router,
}

impl DebugServer {
    /// Build a server around a fresh router from `routes`.
    pub fn new(routes: &dyn RouteTable, request_timeout: Duration) -> Self {
        Self {
            app: Self::build_router(routes.router(), request_timeout),
        }
    }

    #[allow(deprecated)]
    fn build_router(routes: Router, request_timeout: Duration) -> Router {
        routes
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Serve on `listener` in a new task.
    ///
    /// Cancelling `shutdown` closes the listener and lets in-flight requests
    /// finish. Cancelling `force` aborts the connections still open. The
    /// task completes only after every connection task has ended.
    pub fn spawn(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
        force: CancellationToken,
    ) -> JoinHandle<io::Result<()>> {
        tokio::spawn(self.run(listener, shutdown, force))
    }

    async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
        force: CancellationToken,
    ) -> io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::debug!(address = %addr, "Debug server accepting connections");
        }

        let mut connections = JoinSet::new();
        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(
                            self.app.clone(),
                            stream,
                            peer,
                            shutdown.clone(),
                        ));
                    }
                    Err(err) if is_connection_error(&err) => {
                        tracing::debug!(error = %err, "Debug connection dropped during accept");
                    }
                    Err(err) => break Err(err),
                },
            }
        };
        drop(listener);

        let drained = tokio::select! {
            _ = drain(&mut connections) => true,
            _ = force.cancelled() => false,
        };
        if !drained {
            tracing::debug!(
                open_connections = connections.len(),
                "Aborting debug connections"
            );
            connections.abort_all();
            drain(&mut connections).await;
        }

        result
    }
}

async fn serve_connection(
    app: Router,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: CancellationToken,
) {
    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(app));
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(err) = result {
                    tracing::debug!(peer = %peer, error = %err, "Debug connection error");
                }
                break;
            }
            _ = shutdown.cancelled(), if !closing => {
                closing = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

async fn drain(connections: &mut JoinSet<()>) {
    while connections.join_next().await.is_some() {}
}

fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::StandardRoutes;
    use axum::routing::get;

    async fn fetch(url: String) -> Result<String, reqwest::Error> {
        let client = reqwest::Client::builder().no_proxy().build()?;
        client.get(url).send().await?.text().await
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let server = DebugServer::new(&StandardRoutes::new(), Duration::from_secs(5));
        let task = server.spawn(listener, shutdown.clone(), CancellationToken::new());

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();
        let res = client
            .get(format!("http://{addr}/debug/pprof/"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert!(res.headers().contains_key("x-request-id"));

        shutdown.cancel();
        task.await.unwrap().unwrap();

        assert!(client
            .get(format!("http://{addr}/debug/pprof/"))
            .send()
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let slow = || {
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
        };
        let task = DebugServer::new(&slow, Duration::from_millis(100)).spawn(
            listener,
            shutdown.clone(),
            CancellationToken::new(),
        );

        let res = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(format!("http://{addr}/slow"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 408);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_graceful_shutdown_waits_for_in_flight_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let slow = || {
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    "finished"
                }),
            )
        };
        let task = DebugServer::new(&slow, Duration::from_secs(5)).spawn(
            listener,
            shutdown.clone(),
            CancellationToken::new(),
        );

        let request = tokio::spawn(fetch(format!("http://{addr}/slow")));
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(request.await.unwrap().unwrap(), "finished");
    }

    #[tokio::test]
    async fn test_force_aborts_open_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let force = CancellationToken::new();

        let stuck = || {
            Router::new().route(
                "/stuck",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "done"
                }),
            )
        };
        let mut task = DebugServer::new(&stuck, Duration::from_secs(60)).spawn(
            listener,
            shutdown.clone(),
            force.clone(),
        );

        let request = tokio::spawn(fetch(format!("http://{addr}/stuck")));
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown.cancel();
        // The stuck request keeps the server draining.
        assert!(tokio::time::timeout(Duration::from_millis(200), &mut task)
            .await
            .is_err());

        force.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("server did not stop after force")
            .unwrap()
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), request)
            .await
            .expect("client was left hanging")
            .unwrap();
        assert!(outcome.is_err());
    }
}
