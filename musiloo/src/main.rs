use anyhow::{Context, Result};
use motion_playback::{EventDispatcher, Orchestrator};
use tracing::{error, info, warn};

use musiloo::{await_session_handle, begin_authorization, Config, MqttSubscription};

/// Initialize tracing with the configured level unless `RUST_LOG` is set.
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Log in, then play on motion until the process is stopped.
async fn run(config: Config) -> Result<()> {
    let authorization = begin_authorization(&config.auth).await?;
    let session = await_session_handle(authorization).await?;

    let mut orchestrator = Orchestrator::new(session, config.playback.clone());
    if config.prime_on_start {
        if let Err(e) = orchestrator.prime().await {
            warn!("Failed to prime playback: {}", e);
        }
    }

    let (dispatcher, _worker) = EventDispatcher::spawn(orchestrator);
    MqttSubscription::new(&config.mqtt).run(&dispatcher).await;
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to parse configuration")?;
    init_tracing(&config);
    config.print_summary();

    info!("Starting musiloo");

    tokio::select! {
        result = run(config) => {
            if let Err(e) = result {
                error!("{:#}", e);
                std::process::exit(1);
            }
        }
        signal = shutdown_signal() => {
            if let Err(e) = signal {
                error!("{:#}", e);
                std::process::exit(1);
            }
            info!("Received shutdown signal, exiting");
        }
    }

    Ok(())
}
