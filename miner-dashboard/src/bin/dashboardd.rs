use anyhow::Context;
use tokio::signal::unix::{self, SignalKind};

use miner_dashboard::api::{self, AppState};
use miner_dashboard::config::Config;
use miner_dashboard::tracing::{self, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing::init_journald_or_stdout();

    let config = Config::from_env();
    debug!(?config, "Loaded configuration.");

    let addr = config.bind_addr();
    let port = config.port.clone();
    let listener = api::bind(&config).await?;
    let state = AppState::from_config(config).context("failed to set up integrations")?;

    info!(addr = %addr, static_dir = %state.config.static_dir.display(), "Dashboard listening.");
    info!("Dashboard: http://localhost:{port}");

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;

    let mut server = tokio::spawn(api::serve(listener, state.clone()));
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        result = &mut server => {
            // The server only returns on its own if accepting failed.
            state.shutdown.cancel();
            state.push_tasks.close();
            state.push_tasks.wait().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("HTTP server failed"),
                Err(e) => Err(e).context("HTTP server task panicked"),
            };
        }
    }

    trace!("Shutting down.");
    state.shutdown.cancel();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server stopped with error."),
        Err(e) => error!(error = %e, "HTTP server task panicked."),
    }

    state.push_tasks.close();
    state.push_tasks.wait().await;
    info!("Exiting.");
    Ok(())
}
