use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fleetpulse_core::{DeviceStore, SqliteStore};
use fleetpulse_server::{AppState, sweeper};

use crate::cli::ServeArgs;
use crate::config::Config;
use crate::error::CliError;

pub async fn run(args: ServeArgs, config: &Config) -> Result<(), CliError> {
    let policy = config.timing.to_policy();

    let database = args
        .database
        .as_deref()
        .unwrap_or(&config.server.database);
    let store: Arc<dyn DeviceStore> = if database == ":memory:" {
        Arc::new(SqliteStore::open_in_memory()?)
    } else {
        Arc::new(SqliteStore::open(database)?)
    };
    tracing::info!(database, "store opened");

    let state = Arc::new(AppState::new(store, policy.clone()));
    let shutdown = CancellationToken::new();

    if let Some(secs) = args.sweep_interval_secs {
        tokio::spawn(sweeper::run(
            state.reaper.clone(),
            Duration::from_secs(secs),
            policy.staleness_threshold,
            shutdown.child_token(),
        ));
    }

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            signal.cancel();
        }
    });

    let addr = SocketAddr::new(
        args.bind.unwrap_or(config.server.bind),
        args.port.unwrap_or(config.server.port),
    );
    fleetpulse_server::serve(addr, state, shutdown).await?;
    Ok(())
}
