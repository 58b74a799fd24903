use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vibebot::learner::LearnerService;
use vibebot::platform::XApiClient;
use vibebot::{Config, Coordinator};

struct Args {
    config_path: PathBuf,
    skip_bootstrap: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: PathBuf::from("vibebot.toml"),
        skip_bootstrap: false,
    };

    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = argv.next().context("--config requires a path")?;
                args.config_path = PathBuf::from(value);
            }
            "--skip-bootstrap" => args.skip_bootstrap = true,
            "--help" | "-h" => {
                println!("usage: vibebot [--config <path>] [--skip-bootstrap]");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = Config::load(&args.config_path)?;
    info!(
        config = %args.config_path.display(),
        account = %config.platform.account_id,
        "starting vibebot"
    );

    let platform = Arc::new(XApiClient::from_config(&config)?);
    let learner = Arc::new(LearnerService::new(&config.learner)?);
    let coordinator = Coordinator::new(config, platform, learner)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("signal received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    if let Err(err) = coordinator.run(shutdown_rx, args.skip_bootstrap).await {
        error!("fatal: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!("failed to install SIGTERM handler: {}", err);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
