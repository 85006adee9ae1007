use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    entities::Ride,
    error::{not_found_error, unexpected_error, Error},
};

#[derive(Debug)]
struct Rides {
    rides: HashMap<i64, Ride>,
    next_id: i64,
}

/// Shared handle to the in-memory ride collection. Clones refer to the same
/// rides; every read-check-write on a ride happens under the one write lock.
#[derive(Debug, Clone)]
pub struct RideStore {
    inner: Arc<RwLock<Rides>>,
}

impl Default for RideStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RideStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Rides {
                rides: HashMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Inserts `ride` under the next unused id and returns the stored copy.
    #[tracing::instrument(skip_all)]
    pub async fn create(&self, mut ride: Ride) -> Ride {
        let mut guard = self.inner.write().await;

        ride.id = guard.next_id;
        ride.revision = 1;
        guard.next_id += 1;
        guard.rides.insert(ride.id, ride.clone());

        ride
    }

    pub async fn get(&self, id: i64) -> Result<Ride, Error> {
        self.inner
            .read()
            .await
            .rides
            .get(&id)
            .cloned()
            .ok_or_else(not_found_error)
    }

    /// Runs `mutate` against a copy of ride `id` while holding the write lock.
    /// The copy replaces the stored ride only if `mutate` succeeds and changed
    /// something, in which case the revision is bumped.
    #[tracing::instrument(skip(self, mutate))]
    pub async fn update<T, F>(&self, id: i64, mutate: F) -> Result<(T, Ride), Error>
    where
        F: FnOnce(&mut Ride) -> Result<T, Error>,
    {
        let mut guard = self.inner.write().await;
        let current = guard.rides.get_mut(&id).ok_or_else(not_found_error)?;

        let mut draft = current.clone();
        let output = mutate(&mut draft)?;

        if draft.id != current.id {
            return Err(unexpected_error());
        }

        if draft != *current {
            draft.revision = current.revision + 1;
            *current = draft;
        }

        Ok((output, current.clone()))
    }

    /// Snapshot of every ride, ordered by id.
    pub async fn list(&self) -> Vec<Ride> {
        self.list_where(|_| true).await
    }

    pub async fn list_where<P>(&self, predicate: P) -> Vec<Ride>
    where
        P: Fn(&Ride) -> bool,
    {
        let guard = self.inner.read().await;

        let mut rides: Vec<Ride> = guard
            .rides
            .values()
            .filter(|ride| predicate(ride))
            .cloned()
            .collect();
        rides.sort_by_key(|ride| ride.id);

        rides
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rides.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Loads rides recovered from a durable mirror. Id allocation continues
    /// after the highest id seen so ids are never handed out twice.
    #[tracing::instrument(skip_all, fields(count = rides.len()))]
    pub async fn restore(&self, rides: Vec<Ride>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;

        for ride in rides {
            if ride.id <= 0 {
                tracing::warn!(ride_id = ride.id, "skipping restored ride with invalid id");
                continue;
            }

            guard.next_id = guard.next_id.max(ride.id + 1);
            guard.rides.insert(ride.id, ride);
        }

        tracing::info!(next_id = guard.next_id, "restored rides");

        Ok(())
    }
}

#[cfg(test)]
fn unsaved_ride() -> Ride {
    use crate::config::EngineConfig;
    use crate::entities::{Coordinates, Location, RideRequest};
    use chrono::Utc;

    let here = Location::new(Coordinates { lat: -8.05, lng: -34.88 }, "".into());
    let request = RideRequest::new(1, here.clone(), here).with_estimated_duration(20);

    Ride::new(request, &EngineConfig::default(), Utc::now()).unwrap()
}

#[test]
fn create_assigns_increasing_ids() {
    use tokio_test::block_on;

    let store = RideStore::new();

    let first = block_on(store.create(unsaved_ride()));
    let second = block_on(store.create(unsaved_ride()));

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(first.revision, 1);
    assert_eq!(block_on(store.len()), 2);
    assert_eq!(block_on(store.get(2)).unwrap(), second);
    assert!(block_on(store.get(3)).unwrap_err().is_not_found_error());
}

#[test]
fn failed_update_leaves_ride_untouched() {
    use crate::error::invalid_transition_error;
    use tokio_test::block_on;

    let store = RideStore::new();
    let ride = block_on(store.create(unsaved_ride()));

    let result = block_on(store.update(ride.id, |ride| {
        ride.driver_id = 42;
        ride.price = 0.0;
        Err::<(), _>(invalid_transition_error())
    }));

    assert!(result.unwrap_err().is_invalid_transition_error());
    assert_eq!(block_on(store.get(ride.id)).unwrap(), ride);
}

#[test]
fn update_bumps_revision_only_on_change() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let ride = block_on(store.create(unsaved_ride()));

    let (_, unchanged) = block_on(store.update(ride.id, |_| Ok(()))).unwrap();
    assert_eq!(unchanged.revision, 1);

    let (_, changed) = block_on(store.update(ride.id, |ride| {
        ride.driver_lat = Some(1.0);
        ride.driver_lng = Some(2.0);
        Ok(())
    }))
    .unwrap();
    assert_eq!(changed.revision, 2);

    assert!(block_on(store.update(99, |_| Ok(()))).unwrap_err().is_not_found_error());
}

#[test]
fn update_rejects_id_changes() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let ride = block_on(store.create(unsaved_ride()));

    let result = block_on(store.update(ride.id, |ride| {
        ride.id = 7;
        Ok(())
    }));

    assert!(result.is_err());
    assert!(block_on(store.get(7)).is_err());
    assert_eq!(block_on(store.get(ride.id)).unwrap().id, ride.id);
}

#[test]
fn restore_continues_id_allocation() {
    use tokio_test::block_on;

    let store = RideStore::new();

    let mut old = unsaved_ride();
    old.id = 41;
    block_on(store.restore(vec![old])).unwrap();

    let next = block_on(store.create(unsaved_ride()));
    assert_eq!(next.id, 42);
    assert_eq!(
        block_on(store.list()).iter().map(|ride| ride.id).collect::<Vec<_>>(),
        vec![41, 42]
    );
}
