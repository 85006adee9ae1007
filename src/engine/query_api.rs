use super::Engine;

use async_trait::async_trait;

use crate::{
    api::RideQueryAPI,
    entities::{Ride, RideStatus},
    error::{validation_error, Error},
};

#[async_trait]
impl RideQueryAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn get_ride(&self, id: i64) -> Result<Ride, Error> {
        self.store.get(id).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_rides(&self) -> Result<Vec<Ride>, Error> {
        Ok(self.store.list().await)
    }

    #[tracing::instrument(skip(self))]
    async fn list_history(&self, driver_id: i64) -> Result<Vec<Ride>, Error> {
        if driver_id <= 0 {
            return Err(validation_error("driver id is required"));
        }

        let mut rides = self
            .store
            .list_where(|ride| ride.driver_id == driver_id && ride.is_terminal())
            .await;
        rides.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));

        Ok(rides)
    }

    #[tracing::instrument(skip(self))]
    async fn find_active_ride(&self, driver_id: i64) -> Result<Option<Ride>, Error> {
        if driver_id <= 0 {
            return Err(validation_error("driver id is required"));
        }

        let rides = self
            .store
            .list_where(|ride| {
                ride.driver_id == driver_id
                    && matches!(ride.status, RideStatus::DriverFound | RideStatus::InProgress)
            })
            .await;

        Ok(rides.into_iter().next())
    }
}

#[tokio::test]
async fn history_lists_terminal_rides_newest_first() {
    use crate::api::RideAPI;
    use crate::engine::{test_engine, test_request};
    use chrono::Duration;

    let (engine, clock) = test_engine();

    let first = engine.request_ride(test_request(1, 20)).await.unwrap();
    engine.accept_ride(first.id, 7).await.unwrap();
    engine.cancel_by_driver(first.id, 7, None).await.unwrap();

    clock.advance(Duration::minutes(1));
    let second = engine.request_ride(test_request(2, 20)).await.unwrap();
    engine.accept_ride(second.id, 7).await.unwrap();
    engine.start_ride(second.id).await.unwrap();
    clock.advance(Duration::minutes(20));
    engine.finalize_ride(second.id).await.unwrap();

    let active = engine.request_ride(test_request(3, 20)).await.unwrap();
    engine.accept_ride(active.id, 7).await.unwrap();

    let other = engine.request_ride(test_request(4, 20)).await.unwrap();
    engine.accept_ride(other.id, 8).await.unwrap();
    engine.cancel_by_driver(other.id, 8, None).await.unwrap();

    let history = engine.list_history(7).await.unwrap();
    let ids: Vec<i64> = history.iter().map(|ride| ride.id).collect();

    assert_eq!(ids, vec![second.id, first.id]);
    assert!(engine.list_history(99).await.unwrap().is_empty());
    assert!(engine.list_history(0).await.unwrap_err().is_validation_error());
}

#[tokio::test]
async fn active_ride_follows_the_driver() {
    use crate::api::RideAPI;
    use crate::engine::{test_engine, test_request};

    let (engine, _) = test_engine();

    let ride = engine.request_ride(test_request(1, 20)).await.unwrap();
    assert_eq!(engine.find_active_ride(7).await.unwrap(), None);

    engine.accept_ride(ride.id, 7).await.unwrap();
    let active = engine.find_active_ride(7).await.unwrap().unwrap();
    assert_eq!(active.id, ride.id);
    assert_eq!(active.status, RideStatus::DriverFound);

    engine.start_ride(ride.id).await.unwrap();
    assert!(engine.find_active_ride(7).await.unwrap().is_some());
    assert_eq!(engine.find_active_ride(8).await.unwrap(), None);

    engine.finalize_ride(ride.id).await.unwrap();
    assert_eq!(engine.find_active_ride(7).await.unwrap(), None);
}

#[test]
fn get_and_list_return_snapshots() {
    use crate::api::RideAPI;
    use crate::engine::{test_engine, test_request};
    use tokio_test::block_on;

    let (engine, _) = test_engine();

    let ride = block_on(engine.request_ride(test_request(1, 20))).unwrap();
    let mut snapshot = block_on(engine.get_ride(ride.id)).unwrap();
    snapshot.price = 0.0;

    assert_eq!(block_on(engine.get_ride(ride.id)).unwrap().price, 30.0);
    assert_eq!(block_on(engine.list_rides()).unwrap().len(), 1);
    assert!(block_on(engine.get_ride(2)).unwrap_err().is_not_found_error());
}
