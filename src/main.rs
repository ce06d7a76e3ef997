use gridwatch::clock::Clock;
use gridwatch::config::Config;
use gridwatch::grid_state::GridStateService;
use gridwatch::history::GridHistoryService;
use gridwatch::logging;
use gridwatch::monitor::Monitor;
use gridwatch::outage::OutageService;
use gridwatch::report;
use gridwatch::web::{self, AppState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("{}", e))?;
    logging::init_logging(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Gridwatch {} starting up", gridwatch::VERSION);

    let clock = Clock::new(&config.timezone).map_err(|e| anyhow::anyhow!("{}", e))?;
    let reporter = report::log_reporter();

    // Single process-wide shutdown signal, observed by every poller wait point
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let monitor = Arc::new(Monitor::new(config.address(), gridwatch::VERSION.to_string()));

    let history = Arc::new(GridHistoryService::new(
        config.history.file_path.clone(),
        config.history.window,
        clock,
        Arc::clone(&reporter),
    ));
    history.start(vec![monitor.on_history_snapshot()]);
    monitor.set_history(history.state());

    let outage = Arc::new(
        OutageService::new(&config.outage, Arc::clone(&reporter))
            .map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    outage.start(shutdown_rx.clone(), vec![monitor.on_outage_update()]);

    let grid = Arc::new(
        GridStateService::new(
            config.sensor.state_url(),
            config.sensor.token.clone(),
            config.sensor.poll_interval,
            Arc::clone(&reporter),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    grid.start(
        shutdown_rx.clone(),
        vec![history.on_history_update(), monitor.on_grid_update()],
    );

    let state = AppState {
        monitor: Arc::clone(&monitor),
        clock,
    };
    web::serve(state, &config.web.host, config.web.port, shutdown_rx)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Shutdown complete");
    Ok(())
}

/// Flip the shutdown signal on SIGINT or SIGTERM
fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut terminate) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = terminate.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("Termination requested, shutting down");
        let _ = shutdown_tx.send(true);
    });
}
