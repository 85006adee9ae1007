use std::sync::Arc;

use rideline::api::RideAPI;
use rideline::clock::ManualClock;
use rideline::config::EngineConfig;
use rideline::db::{JsonFileMirror, RideMirror};
use rideline::engine::{Engine, RideStore};
use rideline::entities::{Coordinates, Location, RideRequest, RideStatus};

fn request(passenger_id: i64) -> RideRequest {
    let origin = Location::new(Coordinates::new(-8.0631, -34.8711).unwrap(), "Marco Zero".into());
    let destination = Location::new(Coordinates::new(-8.0546, -34.9091).unwrap(), "Madalena".into());

    RideRequest::new(passenger_id, origin, destination)
}

#[tokio::test]
async fn restart_restores_rides_and_id_allocation() {
    let path = std::env::temp_dir().join(format!("rideline-{}.json", uuid::Uuid::new_v4()));
    let clock = ManualClock::default();

    let mirror = Arc::new(JsonFileMirror::open(&path).await.unwrap());
    let engine = Engine::new(EngineConfig::default(), RideStore::new(), Arc::new(clock.clone()))
        .with_mirror(mirror);

    let first = engine.request_ride(request(1)).await.unwrap();
    let second = engine.request_ride(request(2)).await.unwrap();
    engine.accept_ride(first.id, 42).await.unwrap();
    engine.cancel_by_rider(second.id, Some("too slow".into())).await.unwrap();
    drop(engine);

    let reopened = JsonFileMirror::open(&path).await.unwrap();
    let store = RideStore::new();
    store.restore(reopened.load().await.unwrap()).await.unwrap();

    let engine = Engine::new(EngineConfig::default(), store, Arc::new(clock));

    let restored = engine.store().get(first.id).await.unwrap();
    assert_eq!(restored.status, RideStatus::DriverFound);
    assert_eq!(restored.driver_id, 42);

    let cancelled = engine.store().get(second.id).await.unwrap();
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("too slow"));

    let third = engine.request_ride(request(3)).await.unwrap();
    assert_eq!(third.id, 3);

    std::fs::remove_file(&path).unwrap();
}
