use super::Engine;

use async_trait::async_trait;

use crate::{
    api::DeadlineAPI,
    entities::{DeadlineAction, NotificationKind, SweepReport},
    error::Error,
};

#[async_trait]
impl DeadlineAPI for Engine {
    /// One pass of the timeout monitor. Each ride is re-checked under the
    /// store lock, so a ride finalized or cancelled since the snapshot is
    /// skipped rather than overwritten.
    #[tracing::instrument(skip(self))]
    async fn enforce_deadlines(&self) -> Result<SweepReport, Error> {
        let candidates = self.store.list_where(|ride| !ride.is_terminal()).await;
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        for candidate in candidates {
            let grace = self.config.grace_minutes;
            let result = self
                .store
                .update(candidate.id, |ride| ride.enforce_deadline(self.clock.now(), grace))
                .await;

            match result {
                Ok((Some(DeadlineAction::TimedOut), ride)) => {
                    report.timed_out.push(ride.id);
                    self.committed(
                        &ride,
                        Some(NotificationKind::TimedOut),
                        "ride cancelled: exceeded estimated duration plus grace window".into(),
                    )
                    .await;
                }
                Ok((Some(DeadlineAction::FlaggedLate), ride)) => {
                    report.flagged_late.push(ride.id);
                    self.committed(
                        &ride,
                        Some(NotificationKind::Late),
                        "ride is running past its estimated duration".into(),
                    )
                    .await;
                }
                Ok((None, _)) => {}
                Err(err) if err.is_validation_error() => {
                    tracing::warn!(ride_id = candidate.id, %err, "ride has an unusable deadline");
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::debug!(ride_id = candidate.id, %err, "ride changed before deadline check");
                    report.skipped += 1;
                }
            }
        }

        if report.changed() > 0 {
            tracing::info!(
                scanned = report.scanned,
                timed_out = report.timed_out.len(),
                flagged_late = report.flagged_late.len(),
                "deadline sweep applied changes"
            );
        }

        Ok(report)
    }
}

#[tokio::test]
async fn sweep_times_out_searching_rides() {
    use crate::api::{RideAPI, RideQueryAPI};
    use crate::engine::{test_engine, test_request};
    use crate::entities::RideStatus;
    use chrono::Duration;

    let (engine, clock) = test_engine();
    let notifications = engine.notifications();

    let ride = engine.request_ride(test_request(1, 1)).await.unwrap();

    clock.advance(Duration::minutes(16));
    let report = engine.enforce_deadlines().await.unwrap();
    assert_eq!(report, SweepReport { scanned: 1, ..SweepReport::default() });

    clock.advance(Duration::minutes(1));
    let report = engine.enforce_deadlines().await.unwrap();
    assert_eq!(report.timed_out, vec![ride.id]);

    let stored = engine.get_ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::CancelledTimeout);
    assert!(stored.cancelled_at.is_some());
    assert!(stored.is_late);

    let notification = notifications.try_recv().unwrap();
    assert_eq!(notification.kind, NotificationKind::TimedOut);

    let report = engine.enforce_deadlines().await.unwrap();
    assert_eq!(report.scanned, 0);
}

#[tokio::test]
async fn sweep_flags_late_rides_once() {
    use crate::api::{RideAPI, RideQueryAPI};
    use crate::engine::{test_engine, test_request};
    use crate::entities::RideStatus;
    use chrono::Duration;

    let (engine, clock) = test_engine();

    let ride = engine.request_ride(test_request(1, 10)).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();

    clock.advance(Duration::minutes(11));
    let report = engine.enforce_deadlines().await.unwrap();
    assert_eq!(report.flagged_late, vec![ride.id]);

    let report = engine.enforce_deadlines().await.unwrap();
    assert_eq!(report.changed(), 0);

    let stored = engine.get_ride(ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::InProgress);
    assert!(stored.is_late);

    // a late ride can still complete
    let finished = engine.finalize_ride(ride.id).await.unwrap();
    assert_eq!(finished.status, RideStatus::CompletedLate);
}

#[tokio::test]
async fn early_finish_after_a_late_flag_is_not_late() {
    use crate::api::{RideAPI, RideQueryAPI};
    use crate::engine::{test_engine, test_request};
    use crate::entities::RideStatus;
    use chrono::Duration;

    let (engine, clock) = test_engine();

    let ride = engine.request_ride(test_request(1, 10)).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();

    // the driver takes a while to arrive, then drives quickly
    clock.advance(Duration::minutes(11));
    let report = engine.enforce_deadlines().await.unwrap();
    assert_eq!(report.flagged_late, vec![ride.id]);

    engine.start_ride(ride.id).await.unwrap();
    clock.advance(Duration::minutes(2));
    let finished = engine.finalize_ride(ride.id).await.unwrap();

    assert_eq!(finished.status, RideStatus::CompletedEarly);
    assert!(finished.bonus_applied);
    assert!(!finished.is_late);
    finished.check_invariants().unwrap();
    assert_eq!(engine.get_ride(ride.id).await.unwrap(), finished);
}
