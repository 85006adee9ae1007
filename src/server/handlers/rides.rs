use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};

use crate::api::{RideAPI, RideQueryAPI};
use crate::entities::{Coordinates, Ride, RideRequest};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct AcceptParams {
    driver_id: i64,
}

#[derive(Serialize, Deserialize)]
pub struct PositionParams {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize)]
pub struct CancelParams {
    reason: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct DriverCancelParams {
    driver_id: i64,
    reason: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RateParams {
    rating: i64,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(request): Json<RideRequest>,
) -> Result<Json<Ride>, Error> {
    let ride = api.request_ride(request).await?;

    Ok(ride.into())
}

pub async fn list(Extension(api): Extension<DynAPI>) -> Result<Json<Vec<Ride>>, Error> {
    let rides = api.list_rides().await?;

    Ok(rides.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
) -> Result<Json<Ride>, Error> {
    let ride = api.get_ride(id).await?;

    Ok(ride.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
    Json(params): Json<AcceptParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.accept_ride(id, params.driver_id).await?;

    Ok(ride.into())
}

pub async fn start(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
) -> Result<Json<Ride>, Error> {
    let ride = api.start_ride(id).await?;

    Ok(ride.into())
}

pub async fn update_position(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
    Json(params): Json<PositionParams>,
) -> Result<Json<Ride>, Error> {
    let position = Coordinates::new(params.latitude, params.longitude)?;
    let ride = api.update_position(id, position).await?;

    Ok(ride.into())
}

pub async fn finalize(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
) -> Result<Json<Ride>, Error> {
    let ride = api.finalize_ride(id).await?;

    Ok(ride.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
    params: Option<Json<CancelParams>>,
) -> Result<Json<Ride>, Error> {
    let reason = params.and_then(|Json(params)| params.reason);
    let ride = api.cancel_by_rider(id, reason).await?;

    Ok(ride.into())
}

pub async fn cancel_by_driver(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
    Json(params): Json<DriverCancelParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api
        .cancel_by_driver(id, params.driver_id, params.reason)
        .await?;

    Ok(ride.into())
}

pub async fn rate(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<i64>,
    Json(params): Json<RateParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.rate_ride(id, params.rating).await?;

    Ok(ride.into())
}

#[tokio::test]
async fn handlers_drive_a_ride_to_completion() {
    use crate::engine::{test_engine, test_request};
    use crate::entities::RideStatus;
    use std::sync::Arc;

    let (engine, _) = test_engine();
    let api: DynAPI = Arc::new(engine);

    let Json(ride) = create(Extension(api.clone()), Json(test_request(1, 20)))
        .await
        .unwrap();

    accept(Extension(api.clone()), Path(ride.id), Json(AcceptParams { driver_id: 9 }))
        .await
        .unwrap();
    start(Extension(api.clone()), Path(ride.id)).await.unwrap();

    let position = PositionParams {
        latitude: -8.03,
        longitude: -34.86,
    };
    let Json(moved) = update_position(Extension(api.clone()), Path(ride.id), Json(position))
        .await
        .unwrap();
    assert_eq!(moved.driver_lat, Some(-8.03));

    let Json(done) = finalize(Extension(api.clone()), Path(ride.id)).await.unwrap();
    assert_eq!(done.status, RideStatus::CompletedEarly);

    let Json(rated) = rate(Extension(api.clone()), Path(ride.id), Json(RateParams { rating: 5 }))
        .await
        .unwrap();
    assert_eq!(rated.rating, Some(5));

    let Json(rides) = list(Extension(api)).await.unwrap();
    assert_eq!(rides, vec![rated]);
}

#[tokio::test]
async fn cancel_accepts_an_empty_body() {
    use crate::engine::{test_engine, test_request};
    use crate::entities::RideStatus;
    use std::sync::Arc;

    let (engine, _) = test_engine();
    let api: DynAPI = Arc::new(engine);

    let Json(ride) = create(Extension(api.clone()), Json(test_request(1, 20)))
        .await
        .unwrap();

    let Json(cancelled) = cancel(Extension(api.clone()), Path(ride.id), None).await.unwrap();
    assert_eq!(cancelled.status, RideStatus::CancelledByRider);

    let err = cancel_by_driver(
        Extension(api),
        Path(ride.id),
        Json(DriverCancelParams {
            driver_id: 4,
            reason: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(err.is_invalid_transition_error());
}

#[tokio::test]
async fn unknown_ride_maps_to_not_found() {
    use crate::engine::test_engine;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Arc;

    let (engine, _) = test_engine();
    let api: DynAPI = Arc::new(engine);

    let err = find(Extension(api), Path(12)).await.unwrap_err();

    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}
