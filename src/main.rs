use std::sync::Arc;

use rideline::clock::{ManualClock, SystemClock};
use rideline::config::Config;
use rideline::db::{JsonFileMirror, PgMirror, RideMirror};
use rideline::engine::{Engine, RideStore};
use rideline::error::Error;
use rideline::monitor::TimeoutMonitor;
use rideline::server::serve;
use rideline::simulation::{Executor, SimulationConfig};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    if std::env::args().nth(1).as_deref() == Some("simulate") {
        return simulate(config).await;
    }

    let store = RideStore::new();
    let mut engine = Engine::new(config.engine.clone(), store.clone(), Arc::new(SystemClock));

    if let Some(mirror) = open_mirror(&config).await? {
        store.restore(mirror.load().await?).await?;
        engine = engine.with_mirror(mirror);
    }

    let engine = Arc::new(engine);

    let notifications = engine.notifications();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            tracing::info!(
                ride_id = notification.ride_id,
                kind = ?notification.kind,
                status = notification.status.name(),
                "{}",
                notification.message
            );
        }
    });

    let monitor = TimeoutMonitor::new(engine.clone(), config.monitor_interval).start();

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for shutdown signal");
        }
        tracing::info!("shutting down");
    };

    let served = serve(engine, config.server_addr, shutdown).await;

    monitor.stop().await?;

    served
}

async fn open_mirror(config: &Config) -> Result<Option<Arc<dyn RideMirror>>, Error> {
    if let Some(uri) = &config.database_url {
        let mirror = PgMirror::new(uri, config.database_max_connections).await?;
        return Ok(Some(Arc::new(mirror)));
    }

    if let Some(path) = &config.state_path {
        let mirror = JsonFileMirror::open(path).await?;
        return Ok(Some(Arc::new(mirror)));
    }

    Ok(None)
}

async fn simulate(config: Config) -> Result<(), Error> {
    let clock = ManualClock::default();
    let engine = Engine::new(config.engine, RideStore::new(), Arc::new(clock.clone()));

    let report = Executor::new(Arc::new(engine), clock, SimulationConfig::default())
        .run()
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.violations.is_empty() {
        tracing::error!(violations = report.violations.len(), "simulation found invariant violations");
    }

    Ok(())
}
