//! signal-profiler
//!
//! Runs the signal-armed debug endpoint for this process until Ctrl-C.
//!
//! ```text
//! $ signal-profiler --address 127.0.0.1:6666 --timeout-secs 60 &
//! $ kill -USR1 $!
//! $ curl http://127.0.0.1:6666/debug/pprof/
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;

use signal_profiler::config::{load_config, ProfilerConfig};
use signal_profiler::http::{StandardRoutes, Vars};
use signal_profiler::observability::{logging, metrics};
use signal_profiler::{Hook, Profiler, TriggerSignal};

#[derive(Parser, Debug)]
#[command(name = "signal-profiler", version, about)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Signal that arms the endpoint (e.g. SIGUSR1, usr2, 34)
    #[arg(long)]
    signal: Option<TriggerSignal>,

    /// Listen address of the debug endpoint (e.g. :6666)
    #[arg(long)]
    address: Option<String>,

    /// Serving duration and shutdown deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn resolve(&self) -> Result<ProfilerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProfilerConfig::default(),
        };

        if let Some(signal) = self.signal {
            config.signal = signal;
        }
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        Ok(config)
    }
}

/// Logs session boundaries and publishes the session count on `/debug/vars`.
struct SessionLog {
    vars: Vars,
    sessions: AtomicU64,
}

impl Hook for SessionLog {
    fn pre_start(&self) {
        let n = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        self.vars.publish("sessions", Value::from(n));
        tracing::info!(session = n, "Debug endpoint session starting");
    }

    fn post_shutdown(&self) {
        tracing::info!(
            session = self.sessions.load(Ordering::Relaxed),
            "Debug endpoint session finished"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    if cli.dry_run {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init(&config.observability.log_level);

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let routes = StandardRoutes::new();
    let hook = Arc::new(SessionLog {
        vars: routes.vars().clone(),
        sessions: AtomicU64::new(0),
    });

    let profiler = Profiler::builder(config)
        .routes(Arc::new(routes))
        .hook(hook)
        .build()?;

    tracing::info!(
        signal = %profiler.signal(),
        address = %profiler.address(),
        timeout = ?profiler.timeout(),
        pid = std::process::id(),
        "signal-profiler ready"
    );

    profiler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    profiler.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
