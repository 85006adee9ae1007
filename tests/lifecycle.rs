use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use rideline::api::{DeadlineAPI, RideAPI, RideQueryAPI};
use rideline::clock::ManualClock;
use rideline::config::{EngineConfig, TimingBasis};
use rideline::engine::{Engine, RideStore};
use rideline::entities::{Coordinates, Location, RideRequest, RideStatus};
use rideline::monitor::TimeoutMonitor;

fn engine_with(config: EngineConfig) -> (Arc<Engine>, ManualClock) {
    let clock = ManualClock::default();
    let engine = Engine::new(config, RideStore::new(), Arc::new(clock.clone()));

    (Arc::new(engine), clock)
}

fn request(passenger_id: i64, estimated_minutes: i64) -> RideRequest {
    let origin = Location::new(Coordinates::new(-8.0631, -34.8711).unwrap(), "Marco Zero".into());
    let destination = Location::new(Coordinates::new(-8.1186, -34.9011).unwrap(), "Boa Viagem".into());

    RideRequest::new(passenger_id, origin, destination)
        .with_estimated_duration(estimated_minutes)
        .with_price(25.0)
}

#[tokio::test]
async fn ids_are_monotonic_and_never_reused() {
    let (engine, _) = engine_with(EngineConfig::default());

    let first = engine.request_ride(request(1, 20)).await.unwrap();
    let second = engine.request_ride(request(1, 20)).await.unwrap();

    assert_eq!((first.id, second.id), (1, 2));
    assert_eq!(first.status, RideStatus::Searching);

    engine.cancel_by_rider(first.id, None).await.unwrap();
    let third = engine.request_ride(request(1, 20)).await.unwrap();
    assert_eq!(third.id, 3);

    // terminal rides stay queryable
    assert_eq!(engine.get_ride(first.id).await.unwrap().status, RideStatus::CancelledByRider);
}

#[tokio::test]
async fn oversized_estimates_are_rejected() {
    let (engine, _) = engine_with(EngineConfig::default());

    for minutes in [i64::MAX, 24 * 60 + 1] {
        let err = engine.request_ride(request(1, minutes)).await.unwrap_err();
        assert!(err.is_validation_error(), "{} minutes", minutes);
    }

    assert!(engine.list_rides().await.unwrap().is_empty());
    assert_eq!(engine.request_ride(request(1, 24 * 60)).await.unwrap().id, 1);
    assert_eq!(engine.enforce_deadlines().await.unwrap().skipped, 0);
}

#[tokio::test]
async fn immediate_finalize_completes_early_with_bonus() {
    let (engine, _) = engine_with(EngineConfig::default());

    let ride = engine.request_ride(request(1, 20)).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();

    let err = engine.finalize_ride(ride.id).await.unwrap_err();
    assert!(err.is_invalid_transition_error());

    engine.start_ride(ride.id).await.unwrap();
    let finished = engine.finalize_ride(ride.id).await.unwrap();

    assert_eq!(finished.status, RideStatus::CompletedEarly);
    assert!(finished.bonus_applied);
    assert_eq!(finished.price, 30.0);
    assert!(finished.completed_at.is_some());
    assert!(finished.cancelled_at.is_none());
}

#[tokio::test]
async fn driver_cannot_cancel_an_underway_ride() {
    let (engine, _) = engine_with(EngineConfig::default());

    let ride = engine.request_ride(request(1, 20)).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();

    let err = engine.cancel_by_driver(ride.id, 42, None).await.unwrap_err();

    assert!(err.is_invalid_transition_error());
    assert_eq!(engine.get_ride(ride.id).await.unwrap().status, RideStatus::InProgress);
}

#[tokio::test]
async fn only_the_assigned_driver_may_cancel() {
    let (engine, _) = engine_with(EngineConfig::default());

    let ride = engine.request_ride(request(1, 20)).await.unwrap();

    let err = engine.cancel_by_driver(ride.id, 99, None).await.unwrap_err();
    assert!(err.is_forbidden_error());

    engine.accept_ride(ride.id, 42).await.unwrap();

    let err = engine.cancel_by_driver(ride.id, 99, None).await.unwrap_err();
    assert!(err.is_forbidden_error());
    assert_eq!(engine.get_ride(ride.id).await.unwrap().status, RideStatus::DriverFound);

    let cancelled = engine
        .cancel_by_driver(ride.id, 42, Some("flat tyre".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, RideStatus::CancelledByDriver);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("flat tyre"));
}

#[tokio::test]
async fn monitor_cancels_rides_nobody_accepted() {
    let (engine, clock) = engine_with(EngineConfig::default());

    let ride = engine.request_ride(request(1, 1)).await.unwrap();
    clock.advance(Duration::minutes(17));

    let monitor = TimeoutMonitor::new(engine.clone(), StdDuration::from_millis(5)).start();

    let mut status = RideStatus::Searching;
    for _ in 0..200 {
        status = engine.get_ride(ride.id).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }

    monitor.stop().await.unwrap();

    assert_eq!(status, RideStatus::CancelledTimeout);
    assert!(engine.get_ride(ride.id).await.unwrap().cancelled_at.is_some());
}

#[tokio::test]
async fn finalize_outcome_boundaries() {
    let cases = [
        (Duration::minutes(19), RideStatus::CompletedEarly),
        (Duration::minutes(20), RideStatus::CompletedOnTime),
        (Duration::minutes(20) + Duration::seconds(1), RideStatus::CompletedLate),
        (Duration::minutes(35), RideStatus::CompletedLate),
        (Duration::minutes(35) + Duration::seconds(1), RideStatus::CancelledTimeout),
    ];

    for (elapsed, expected) in cases {
        let (engine, clock) = engine_with(EngineConfig::default());

        let ride = engine.request_ride(request(1, 20)).await.unwrap();
        engine.accept_ride(ride.id, 42).await.unwrap();
        engine.start_ride(ride.id).await.unwrap();
        clock.advance(elapsed);

        let finished = engine.finalize_ride(ride.id).await.unwrap();
        assert_eq!(finished.status, expected, "after {}", elapsed);
        assert_eq!(finished.bonus_applied, expected == RideStatus::CompletedEarly);
        assert_eq!(finished.cancelled_at.is_some(), expected == RideStatus::CancelledTimeout);
    }
}

#[tokio::test]
async fn requested_basis_counts_the_wait_for_a_driver() {
    let config = EngineConfig {
        finalize_basis: TimingBasis::Requested,
        ..EngineConfig::default()
    };
    let (engine, clock) = engine_with(config);

    let ride = engine.request_ride(request(1, 20)).await.unwrap();
    clock.advance(Duration::minutes(15));
    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();
    clock.advance(Duration::minutes(10));

    let finished = engine.finalize_ride(ride.id).await.unwrap();
    assert_eq!(finished.status, RideStatus::CompletedLate);
}

#[tokio::test]
async fn second_finalize_leaves_terminal_fields_alone() {
    let (engine, clock) = engine_with(EngineConfig::default());

    let ride = engine.request_ride(request(1, 20)).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();
    clock.advance(Duration::minutes(25));

    let first = engine.finalize_ride(ride.id).await.unwrap();
    clock.advance(Duration::minutes(60));

    assert!(engine.finalize_ride(ride.id).await.unwrap_err().is_invalid_transition_error());
    assert!(engine.enforce_deadlines().await.unwrap().timed_out.is_empty());
    assert_eq!(engine.get_ride(ride.id).await.unwrap(), first);
}

#[tokio::test]
async fn ratings_are_bounded() {
    let (engine, _) = engine_with(EngineConfig::default());

    let ride = engine.request_ride(request(1, 20)).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();
    engine.finalize_ride(ride.id).await.unwrap();

    for rating in [0, 6, -1] {
        assert!(engine.rate_ride(ride.id, rating).await.unwrap_err().is_validation_error());
    }

    assert_eq!(engine.rate_ride(ride.id, 1).await.unwrap().rating, Some(1));
}

#[tokio::test]
async fn history_only_holds_finished_rides() {
    let (engine, clock) = engine_with(EngineConfig::default());

    for passenger_id in 1..=3 {
        let ride = engine.request_ride(request(passenger_id, 20)).await.unwrap();
        engine.accept_ride(ride.id, 42).await.unwrap();
        engine.start_ride(ride.id).await.unwrap();
        clock.advance(Duration::minutes(5));
    }

    engine.finalize_ride(1).await.unwrap();
    engine.finalize_ride(3).await.unwrap();

    let history = engine.list_history(42).await.unwrap();
    assert_eq!(history.iter().map(|ride| ride.id).collect::<Vec<_>>(), vec![3, 1]);
    assert_eq!(engine.find_active_ride(42).await.unwrap().map(|ride| ride.id), Some(2));
}
