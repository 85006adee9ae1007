use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;

use rideline::api::{DeadlineAPI, RideAPI, RideQueryAPI};
use rideline::clock::ManualClock;
use rideline::config::EngineConfig;
use rideline::engine::{Engine, RideStore};
use rideline::entities::{Coordinates, Location, RideRequest, RideStatus};

fn engine() -> (Arc<Engine>, ManualClock) {
    let clock = ManualClock::default();
    let engine = Engine::new(EngineConfig::default(), RideStore::new(), Arc::new(clock.clone()));

    (Arc::new(engine), clock)
}

fn request(passenger_id: i64) -> RideRequest {
    let origin = Location::new(Coordinates::new(-8.0631, -34.8711).unwrap(), "Marco Zero".into());
    let destination = Location::new(Coordinates::new(-8.0089, -34.8553).unwrap(), "Olinda".into());

    RideRequest::new(passenger_id, origin, destination).with_estimated_duration(10)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_distinct_ids() {
    let (engine, _) = engine();

    let handles = (1..=64).map(|passenger_id| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.request_ride(request(passenger_id)).await })
    });

    let mut ids: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().id)
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=64).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finalize_and_sweep_race_has_one_winner() {
    let (engine, clock) = engine();

    let mut ids = vec![];
    for passenger_id in 1..=32 {
        let ride = engine.request_ride(request(passenger_id)).await.unwrap();
        engine.accept_ride(ride.id, passenger_id + 100).await.unwrap();
        engine.start_ride(ride.id).await.unwrap();
        ids.push(ride.id);
    }

    // past estimate plus grace: both finalize and the sweep want to decide
    clock.advance(Duration::minutes(26));

    let finalizers = ids.iter().map(|&id| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.finalize_ride(id).await })
    });
    let sweeper = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.enforce_deadlines().await })
    };

    let results = join_all(finalizers).await;
    let report = sweeper.await.unwrap().unwrap();

    let mut finalize_wins = 0;
    for result in results {
        match result.unwrap() {
            Ok(ride) => {
                assert_eq!(ride.status, RideStatus::CancelledTimeout);
                finalize_wins += 1;
            }
            Err(err) => assert!(err.is_invalid_transition_error()),
        }
    }

    assert_eq!(finalize_wins + report.timed_out.len(), ids.len());

    for ride in engine.list_rides().await.unwrap() {
        assert_eq!(ride.status, RideStatus::CancelledTimeout);
        assert!(ride.cancelled_at.is_some());
        assert!(ride.completed_at.is_none());
        ride.check_invariants().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn early_finalize_races_an_expired_deadline() {
    let (engine, clock) = engine();

    let mut ids = vec![];
    for passenger_id in 1..=32 {
        let id = engine.request_ride(request(passenger_id)).await.unwrap().id;
        engine.accept_ride(id, passenger_id + 100).await.unwrap();
        ids.push(id);
    }

    // a long wait for pickup and a short drive: finalize would complete early,
    // the sweep would time the ride out
    clock.advance(Duration::minutes(20));
    for &id in &ids {
        engine.start_ride(id).await.unwrap();
    }
    clock.advance(Duration::minutes(6));

    let finalizers = ids.iter().map(|&id| {
        let engine = engine.clone();
        tokio::spawn(async move { (id, engine.finalize_ride(id).await) })
    });
    let sweeper = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.enforce_deadlines().await })
    };

    let results = join_all(finalizers).await;
    let report = sweeper.await.unwrap().unwrap();

    for joined in results {
        let (id, result) = joined.unwrap();
        let stored = engine.get_ride(id).await.unwrap();

        match result {
            Ok(ride) => {
                assert_eq!(ride.status, RideStatus::CompletedEarly);
                assert!(!report.timed_out.contains(&id));
                assert_eq!(stored, ride);
                assert!(stored.cancelled_at.is_none());
            }
            Err(err) => {
                assert!(err.is_invalid_transition_error());
                assert!(report.timed_out.contains(&id));
                assert_eq!(stored.status, RideStatus::CancelledTimeout);
                assert!(stored.completed_at.is_none());
                assert!(!stored.bonus_applied);
            }
        }

        stored.check_invariants().unwrap();
    }

    assert!(report.scanned <= ids.len());
    assert_eq!(report.timed_out.len() + report.skipped, report.scanned);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_drivers_only_one_accepts() {
    let (engine, _) = engine();

    let id = engine.request_ride(request(1)).await.unwrap().id;

    let attempts = (1..=16).map(|driver_id| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.accept_ride(id, driver_id).await })
    });

    let accepted: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .filter_map(|joined| joined.unwrap().ok())
        .collect();

    assert_eq!(accepted.len(), 1);

    let stored = engine.get_ride(id).await.unwrap();
    assert_eq!(stored.driver_id, accepted[0].driver_id);
    assert_eq!(stored.status, RideStatus::DriverFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rider_cancel_races_driver_start() {
    let (engine, _) = engine();

    for passenger_id in 1..=16 {
        let id = engine.request_ride(request(passenger_id)).await.unwrap().id;
        engine.accept_ride(id, 7).await.unwrap();

        let start = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start_ride(id).await })
        };
        let cancel = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.cancel_by_rider(id, None).await })
        };

        let started = start.await.unwrap();
        let cancelled = cancel.await.unwrap();
        assert!(started.is_ok() != cancelled.is_ok());

        let stored = engine.get_ride(id).await.unwrap();
        match stored.status {
            RideStatus::InProgress => assert!(stored.started_at.is_some()),
            RideStatus::CancelledByRider => assert!(stored.started_at.is_none()),
            other => panic!("unexpected status {:?}", other),
        }
    }
}
