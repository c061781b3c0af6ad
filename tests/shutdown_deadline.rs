//! A request that outlives the drain deadline does not hold the session open.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use nix::sys::signal::Signal;
use signal_profiler::{EventKind, StandardRoutes, TriggerSignal};

mod common;

use common::{client, get_when_up, send, FlagHook, Harness};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_deadline_is_reported_and_bounded() {
    let routes = StandardRoutes::new().merge(Router::new().route(
        "/stuck",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(6)).await;
            "done"
        }),
    ));
    let h = Harness::with(TriggerSignal::User1, 1, FlagHook::new(), Some(Arc::new(routes)));
    let client = client();

    assert!(h.profiler.start());
    h.events.wait_armed(1).await;
    send(Signal::SIGUSR1);
    get_when_up(&client, &h.url("/debug/pprof/"), Duration::from_secs(2)).await;

    let stuck_url = h.url("/stuck");
    let stuck = tokio::spawn(async move {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        match client.get(stuck_url).send().await {
            Ok(res) => res.text().await.map(|_| ()),
            Err(err) => Err(err),
        }
    });

    let started = Instant::now();
    assert!(
        h.events
            .wait_for(EventKind::Error, "shutdown debug endpoint", 1, Duration::from_secs(4))
            .await,
        "drain deadline was not reported"
    );
    assert!(h.hook.wait_post_shutdown(1, Duration::from_secs(1)).await);
    // One serving window plus one drain window, with some slack.
    assert!(started.elapsed() < Duration::from_secs(3));

    let timeout_event = h
        .events
        .all()
        .into_iter()
        .find(|e| e.kind == EventKind::Error && e.message == "shutdown debug endpoint")
        .unwrap();
    assert!(timeout_event
        .attrs
        .iter()
        .any(|(k, v)| k == "err" && v.contains("graceful shutdown exceeded")));

    // The listener is gone even though the stuck request was still running.
    assert!(client.get(h.url("/debug/pprof/")).send().await.is_err());

    // The stuck request was cut off, not left to finish after the session.
    let outcome = tokio::time::timeout(Duration::from_secs(1), stuck)
        .await
        .expect("stuck request outlived the session")
        .unwrap();
    assert!(outcome.is_err());
    assert!(started.elapsed() < Duration::from_secs(4));

    h.events.wait_armed(2).await;
    h.profiler.shutdown().await;
}
