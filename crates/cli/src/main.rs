use clap::Parser;
use dnsmux_domain::CliOverrides;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod bootstrap;
mod di;
mod server;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "dnsmux")]
#[command(version)]
#[command(about = "dnsmux - DNS query router over UDP, TCP, TLS, QUIC and HTTPS")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        bind_address: cli.bind.clone(),
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);

    info!("Starting dnsmux v{}", env!("CARGO_PKG_VERSION"));

    let services = di::DnsServices::new(&config).await?;

    let shutdown = CancellationToken::new();
    let mut listeners = JoinSet::new();
    server::spawn_listeners(&config, &services, &shutdown, &mut listeners).await?;

    info!(
        listeners = listeners.len(),
        handlers = services.router.len(),
        "dnsmux ready"
    );

    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        Some(finished) = listeners.join_next() => match finished {
            Ok(()) => warn!("A listener stopped, shutting down the rest"),
            Err(e) => error!(error = %e, "Listener task aborted"),
        },
    }

    shutdown.cancel();

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while listeners.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("Listeners did not stop in time");
        listeners.abort_all();
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
