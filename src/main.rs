//! vod-mirror entry point
//!
//! Loads configuration, prepares the data directory and hands control to the
//! scheduler until a shutdown signal arrives.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vod_mirror::cli::CliOptions;
use vod_mirror::config::Config;
use vod_mirror::jobs;
use vod_mirror::services::{LogFormat, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_env())?;

    let cli = CliOptions::from_args();

    let mut config = Config::from_env().inspect_err(|e| error!(error = %e, "Startup failed"))?;
    let data_dir = config
        .ensure_data_dir()
        .inspect_err(|e| error!(error = %e, "Startup failed"))?;
    info!(data_dir = %data_dir.display(), "Using base data directory");
    info!(channels = %config.channels.join(", "), "Configured channels");

    let scheduler = jobs::build_scheduler(&config).with_single_run(cli.once);

    let shutdown = CancellationToken::new();
    tokio::spawn(handle_signals(shutdown.clone()));

    scheduler.run(shutdown).await;
    Ok(())
}

/// First signal requests a graceful stop; a second one exits immediately.
async fn handle_signals(shutdown: CancellationToken) {
    wait_for_signal().await;
    info!("Shutdown signal received; stopping after the current step");
    shutdown.cancel();

    wait_for_signal().await;
    warn!("Second shutdown signal received; exiting now");
    std::process::exit(130);
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
