use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};

use crate::api::{RideAPI, RideQueryAPI};
use crate::entities::{Coordinates, Ride};
use crate::error::{not_found_error, Error};
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct UpdateLocationParams {
    coordinates: Coordinates,
}

pub async fn history(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Ride>>, Error> {
    let rides = api.list_history(id).await?;

    Ok(rides.into())
}

/// Moves the driver's current ride; 404 when the driver has none.
///
/// The lookup and the move are separate operations. A ride that finishes in
/// between is not retried: the move fails with 409 and the caller sees the
/// ride's terminal state on its next request.
pub async fn update_location(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
    Json(params): Json<UpdateLocationParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.find_active_ride(id).await?.ok_or_else(not_found_error)?;
    let ride = api.update_position(ride.id, params.coordinates).await?;

    Ok(ride.into())
}

#[tokio::test]
async fn location_follows_the_active_ride() {
    use crate::engine::{test_engine, test_request};
    use axum::response::IntoResponse;
    use std::sync::Arc;

    let (engine, _) = test_engine();
    let api: DynAPI = Arc::new(engine);

    let here = Coordinates { lat: -8.04, lng: -34.87 };
    let err = update_location(
        Extension(api.clone()),
        Path(5),
        Json(UpdateLocationParams { coordinates: here }),
    )
    .await
    .unwrap_err();
    assert!(err.is_not_found_error());

    let ride = api.request_ride(test_request(1, 20)).await.unwrap();
    api.accept_ride(ride.id, 5).await.unwrap();

    let Json(moved) = update_location(
        Extension(api.clone()),
        Path(5),
        Json(UpdateLocationParams { coordinates: here }),
    )
    .await
    .unwrap();
    assert_eq!(moved.id, ride.id);
    assert_eq!(moved.driver_position(), Some(here));

    api.cancel_by_driver(ride.id, 5, None).await.unwrap();

    // the move a lookup made just before the cancellation would attempt
    let err = api.update_position(ride.id, here).await.unwrap_err();
    assert!(err.is_invalid_transition_error());
    assert_eq!(err.into_response().status(), axum::http::StatusCode::CONFLICT);

    let err = update_location(
        Extension(api.clone()),
        Path(5),
        Json(UpdateLocationParams { coordinates: here }),
    )
    .await
    .unwrap_err();
    assert!(err.is_not_found_error());

    let Json(rides) = history(Extension(api), Path(5)).await.unwrap();
    assert_eq!(rides.len(), 1);
}
