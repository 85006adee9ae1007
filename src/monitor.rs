use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::DeadlineAPI;
use crate::entities::SweepReport;
use crate::error::{unexpected_error, Error};

type DynDeadlineAPI = Arc<dyn DeadlineAPI + Send + Sync>;

/// Periodically enforces ride deadlines in the background.
pub struct TimeoutMonitor {
    api: DynDeadlineAPI,
    period: Duration,
}

/// Owns a running monitor task. Dropping the handle leaves the task running;
/// call [`MonitorHandle::stop`] to end it.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TimeoutMonitor {
    pub fn new<T: DeadlineAPI + Send + Sync + 'static>(api: Arc<T>, period: Duration) -> Self {
        Self {
            api: api as DynDeadlineAPI,
            period,
        }
    }

    /// Runs a single sweep immediately.
    pub async fn sweep(&self) -> Result<SweepReport, Error> {
        self.api.enforce_deadlines().await
    }

    #[tracing::instrument(name = "TimeoutMonitor::start", skip(self), fields(period_ms = self.period.as_millis() as u64))]
    pub fn start(self) -> MonitorHandle {
        let (shutdown, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("timeout monitor started");

            while !*rx.borrow() {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = self.sweep().await {
                            tracing::warn!(%err, "deadline sweep failed");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("timeout monitor stopped");
        });

        MonitorHandle { shutdown, handle }
    }
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signals the monitor and waits for an in-flight sweep to finish.
    pub async fn stop(self) -> Result<(), Error> {
        let _ = self.shutdown.send(true);

        self.handle.await.map_err(|err| {
            tracing::error!(?err, "timeout monitor task failed");
            unexpected_error()
        })
    }
}

#[tokio::test]
async fn monitor_times_out_abandoned_rides() {
    use crate::api::{RideAPI, RideQueryAPI};
    use crate::engine::{test_engine, test_request};
    use crate::entities::RideStatus;

    let (engine, clock) = test_engine();
    let engine = Arc::new(engine);

    let ride = engine.request_ride(test_request(1, 1)).await.unwrap();
    clock.advance(chrono::Duration::minutes(17));

    let monitor = TimeoutMonitor::new(engine.clone(), Duration::from_millis(10)).start();
    assert!(monitor.is_running());

    let mut status = RideStatus::Searching;
    for _ in 0..100 {
        status = engine.get_ride(ride.id).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    monitor.stop().await.unwrap();
    assert_eq!(status, RideStatus::CancelledTimeout);
}

#[test]
fn manual_sweep_reports_changes() {
    use crate::api::RideAPI;
    use crate::engine::{test_engine, test_request};
    use tokio_test::block_on;

    let (engine, clock) = test_engine();
    let engine = Arc::new(engine);

    let ride = block_on(engine.request_ride(test_request(1, 5))).unwrap();
    block_on(engine.accept_ride(ride.id, 3)).unwrap();
    clock.advance(chrono::Duration::minutes(6));

    let monitor = TimeoutMonitor::new(engine, Duration::from_secs(30));
    let report = block_on(monitor.sweep()).unwrap();

    assert_eq!(report.flagged_late, vec![ride.id]);
    assert!(report.timed_out.is_empty());
}

#[tokio::test]
async fn monitor_outlives_rides_with_unusable_windows() {
    use crate::api::{RideAPI, RideQueryAPI};
    use crate::engine::{test_engine, test_request};
    use crate::entities::RideStatus;

    let (engine, clock) = test_engine();
    let engine = Arc::new(engine);

    // a record that never went through request validation, e.g. restored from disk
    let broken = engine.request_ride(test_request(1, 10)).await.unwrap();
    engine
        .store()
        .update(broken.id, |ride| {
            ride.estimated_duration_minutes = i64::MAX;
            Ok(())
        })
        .await
        .unwrap();

    let ride = engine.request_ride(test_request(2, 1)).await.unwrap();
    clock.advance(chrono::Duration::minutes(17));

    let monitor = TimeoutMonitor::new(engine.clone(), Duration::from_millis(10)).start();

    let mut status = RideStatus::Searching;
    for _ in 0..100 {
        status = engine.get_ride(ride.id).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(status, RideStatus::CancelledTimeout);
    assert_eq!(engine.get_ride(broken.id).await.unwrap().status, RideStatus::Searching);
    assert!(monitor.is_running());
    monitor.stop().await.unwrap();
}
