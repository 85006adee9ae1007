use super::Engine;

use async_trait::async_trait;

use crate::{
    api::RideAPI,
    entities::{Coordinates, NotificationKind, Ride, RideRequest, RideStatus},
    error::{validation_error, Error},
};

#[async_trait]
impl RideAPI for Engine {
    #[tracing::instrument(skip(self, request), fields(passenger_id = request.passenger_id))]
    async fn request_ride(&self, request: RideRequest) -> Result<Ride, Error> {
        let ride = Ride::new(request, &self.config, self.clock.now())?;
        let ride = self.store.create(ride).await;

        self.committed(&ride, None, "ride requested".into()).await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_ride(&self, id: i64, driver_id: i64) -> Result<Ride, Error> {
        if driver_id <= 0 {
            return Err(validation_error("driver id is required"));
        }

        let (_, ride) = self
            .store
            .update(id, |ride| ride.accept(driver_id, self.clock.now()))
            .await?;

        let message = format!("driver {} accepted the ride", driver_id);
        self.committed(&ride, Some(NotificationKind::DriverFound), message)
            .await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn update_position(&self, id: i64, position: Coordinates) -> Result<Ride, Error> {
        let position = Coordinates::new(position.lat, position.lng)?;
        let radius = self.config.arrival_radius_km;

        let (arrived, ride) = self
            .store
            .update(id, |ride| {
                let destination = ride.destination.coordinates;
                let was_near = ride
                    .driver_position()
                    .map_or(false, |previous| previous.distance_km(&destination) <= radius);

                ride.update_position(position)?;

                let is_near = position.distance_km(&destination) <= radius;
                Ok(ride.status == RideStatus::InProgress && is_near && !was_near)
            })
            .await?;

        // position-only changes are not mirrored
        if arrived {
            tracing::info!(ride_id = ride.id, "driver arrived near destination");
            self.notify(&ride, NotificationKind::Arrival, "driver arrived at destination".into());
        }

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn start_ride(&self, id: i64) -> Result<Ride, Error> {
        let (_, ride) = self
            .store
            .update(id, |ride| ride.start(self.clock.now()))
            .await?;

        self.committed(&ride, None, "ride started".into()).await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn finalize_ride(&self, id: i64) -> Result<Ride, Error> {
        let (status, ride) = self
            .store
            .update(id, |ride| ride.finalize(self.clock.now(), &self.config))
            .await?;

        let (kind, message) = match status {
            RideStatus::CancelledTimeout => (
                NotificationKind::TimedOut,
                "ride cancelled: exceeded estimated duration plus grace window".to_string(),
            ),
            RideStatus::CompletedEarly => (
                NotificationKind::Completed,
                format!("ride completed early, bonus applied (price {:.2})", ride.price),
            ),
            RideStatus::CompletedLate => (NotificationKind::Completed, "ride completed late".to_string()),
            _ => (NotificationKind::Completed, "ride completed on time".to_string()),
        };

        self.committed(&ride, Some(kind), message).await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_by_rider(&self, id: i64, reason: Option<String>) -> Result<Ride, Error> {
        let (_, ride) = self
            .store
            .update(id, |ride| ride.cancel_by_rider(self.clock.now(), reason))
            .await?;

        self.committed(&ride, Some(NotificationKind::Cancelled), "ride cancelled by rider".into())
            .await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_by_driver(
        &self,
        id: i64,
        driver_id: i64,
        reason: Option<String>,
    ) -> Result<Ride, Error> {
        if driver_id <= 0 {
            return Err(validation_error("driver id is required"));
        }

        let (_, ride) = self
            .store
            .update(id, |ride| ride.cancel_by_driver(driver_id, self.clock.now(), reason))
            .await?;

        self.committed(&ride, Some(NotificationKind::Cancelled), "ride cancelled by driver".into())
            .await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn rate_ride(&self, id: i64, rating: i64) -> Result<Ride, Error> {
        if !(1..=5).contains(&rating) {
            return Err(validation_error("rating must be between 1 and 5"));
        }

        let (_, ride) = self.store.update(id, |ride| ride.rate(rating)).await?;

        self.committed(&ride, None, format!("ride rated {}", rating)).await;

        Ok(ride)
    }
}

#[tokio::test]
async fn request_assigns_sequential_ids() {
    use crate::clock::Clock;
    use crate::engine::{test_engine, test_request};

    let (engine, clock) = test_engine();

    let first = engine.request_ride(test_request(1, 20)).await.unwrap();
    let second = engine.request_ride(test_request(2, 20)).await.unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(first.status, RideStatus::Searching);
    assert_eq!(first.requested_at, clock.now());
}

#[tokio::test]
async fn request_validation_does_not_consume_ids() {
    use crate::engine::{test_engine, test_request};

    let (engine, _) = test_engine();

    let err = engine.request_ride(test_request(0, 20)).await.unwrap_err();
    assert!(err.is_validation_error());

    let ride = engine.request_ride(test_request(1, 20)).await.unwrap();
    assert_eq!(ride.id, 1);
}

#[tokio::test]
async fn early_finalize_applies_bonus() {
    use crate::engine::{test_engine, test_request};
    use chrono::Duration;

    let (engine, clock) = test_engine();
    let ride = engine.request_ride(test_request(1, 20)).await.unwrap();

    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();
    clock.advance(Duration::minutes(3));

    let finished = engine.finalize_ride(ride.id).await.unwrap();

    assert_eq!(finished.status, RideStatus::CompletedEarly);
    assert!(finished.bonus_applied);
    assert_eq!(finished.price, 35.0);
    assert_eq!(finished.driver_id, 42);

    let err = engine.finalize_ride(ride.id).await.unwrap_err();
    assert!(err.is_invalid_transition_error());
    assert_eq!(engine.store().get(ride.id).await.unwrap(), finished);
}

#[tokio::test]
async fn operations_on_unknown_rides_are_not_found() {
    use crate::engine::test_engine;

    let (engine, _) = test_engine();

    assert!(engine.accept_ride(9, 42).await.unwrap_err().is_not_found_error());
    assert!(engine.start_ride(9).await.unwrap_err().is_not_found_error());
    assert!(engine.finalize_ride(9).await.unwrap_err().is_not_found_error());
    assert!(engine.cancel_by_rider(9, None).await.unwrap_err().is_not_found_error());
    assert!(engine.cancel_by_driver(9, 42, None).await.unwrap_err().is_not_found_error());
    assert!(engine.rate_ride(9, 5).await.unwrap_err().is_not_found_error());

    let here = Coordinates { lat: 0.0, lng: 0.0 };
    assert!(engine.update_position(9, here).await.unwrap_err().is_not_found_error());
}

#[tokio::test]
async fn input_validation_precedes_lookup() {
    use crate::engine::test_engine;

    let (engine, _) = test_engine();

    assert!(engine.rate_ride(9, 0).await.unwrap_err().is_validation_error());
    assert!(engine.accept_ride(9, 0).await.unwrap_err().is_validation_error());
    assert!(engine.cancel_by_driver(9, -1, None).await.unwrap_err().is_validation_error());

    let nowhere = Coordinates { lat: 95.0, lng: 0.0 };
    assert!(engine.update_position(9, nowhere).await.unwrap_err().is_validation_error());
}

#[tokio::test]
async fn lifecycle_emits_notifications() {
    use crate::engine::{test_engine, test_request};
    use crate::entities::NotificationKind;

    let (engine, _) = test_engine();
    let notifications = engine.notifications();

    let ride = engine.request_ride(test_request(1, 20)).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.cancel_by_rider(ride.id, Some("changed plans".into())).await.unwrap();

    let found = notifications.try_recv().unwrap();
    assert_eq!(found.kind, NotificationKind::DriverFound);
    assert_eq!(found.status, RideStatus::DriverFound);

    let cancelled = notifications.try_recv().unwrap();
    assert_eq!(cancelled.kind, NotificationKind::Cancelled);
    assert_eq!(cancelled.ride_id, ride.id);
    assert_eq!(cancelled.status, RideStatus::CancelledByRider);

    assert!(notifications.try_recv().is_err());

    let stored = engine.store().get(ride.id).await.unwrap();
    assert_eq!(stored.cancellation_reason.as_deref(), Some("changed plans"));
}

#[tokio::test]
async fn arrival_is_announced_once() {
    use crate::engine::{test_engine, test_request};
    use crate::entities::NotificationKind;

    let (engine, _) = test_engine();
    let notifications = engine.notifications();

    let ride = engine.request_ride(test_request(1, 20)).await.unwrap();
    let destination = ride.destination.coordinates;

    // near the destination but not yet underway
    engine.update_position(ride.id, destination).await.unwrap();
    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();
    let _ = notifications.try_recv();

    engine
        .update_position(ride.id, Coordinates { lat: -8.05, lng: -34.87 })
        .await
        .unwrap();
    assert!(notifications.try_recv().is_err());

    let updated = engine.update_position(ride.id, destination).await.unwrap();
    assert_eq!(updated.status, RideStatus::InProgress);
    assert_eq!(updated.driver_position(), Some(destination));

    let arrival = notifications.try_recv().unwrap();
    assert_eq!(arrival.kind, NotificationKind::Arrival);

    engine.update_position(ride.id, destination).await.unwrap();
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn full_channel_drops_notifications_without_blocking() {
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::engine::{test_request, RideStore};
    use std::sync::Arc;

    let config = EngineConfig {
        notification_capacity: 1,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, RideStore::new(), Arc::new(ManualClock::default()));

    let first = engine.request_ride(test_request(1, 20)).await.unwrap();
    let second = engine.request_ride(test_request(2, 20)).await.unwrap();
    engine.cancel_by_rider(first.id, None).await.unwrap();
    engine.cancel_by_rider(second.id, None).await.unwrap();

    let notifications = engine.notifications();
    assert_eq!(notifications.try_recv().unwrap().ride_id, first.id);
    assert!(notifications.try_recv().is_err());
    assert_eq!(
        engine.store().get(second.id).await.unwrap().status,
        RideStatus::CancelledByRider
    );
}

#[tokio::test]
async fn rating_only_after_completion() {
    use crate::engine::{test_engine, test_request};
    use chrono::Duration;

    let (engine, clock) = test_engine();
    let ride = engine.request_ride(test_request(1, 20)).await.unwrap();

    assert!(engine.rate_ride(ride.id, 4).await.unwrap_err().is_invalid_transition_error());

    engine.accept_ride(ride.id, 42).await.unwrap();
    engine.start_ride(ride.id).await.unwrap();
    clock.advance(Duration::minutes(20));
    let finished = engine.finalize_ride(ride.id).await.unwrap();
    assert_eq!(finished.status, RideStatus::CompletedOnTime);

    let rated = engine.rate_ride(ride.id, 4).await.unwrap();
    assert_eq!(rated.rating, Some(4));
    assert_eq!(rated.price, finished.price);
    assert!(engine.rate_ride(ride.id, 5).await.unwrap_err().is_invalid_transition_error());
}
