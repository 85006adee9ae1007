use async_trait::async_trait;

use crate::entities::{Coordinates, Ride, RideRequest, SweepReport};
use crate::error::Error;

#[async_trait]
pub trait RideAPI {
    async fn request_ride(&self, request: RideRequest) -> Result<Ride, Error>;

    async fn accept_ride(&self, id: i64, driver_id: i64) -> Result<Ride, Error>;

    async fn update_position(&self, id: i64, position: Coordinates) -> Result<Ride, Error>;

    async fn start_ride(&self, id: i64) -> Result<Ride, Error>;

    async fn finalize_ride(&self, id: i64) -> Result<Ride, Error>;

    async fn cancel_by_rider(&self, id: i64, reason: Option<String>) -> Result<Ride, Error>;

    async fn cancel_by_driver(
        &self,
        id: i64,
        driver_id: i64,
        reason: Option<String>,
    ) -> Result<Ride, Error>;

    async fn rate_ride(&self, id: i64, rating: i64) -> Result<Ride, Error>;
}

#[async_trait]
pub trait RideQueryAPI {
    async fn get_ride(&self, id: i64) -> Result<Ride, Error>;

    async fn list_rides(&self) -> Result<Vec<Ride>, Error>;

    /// Terminal rides of `driver_id`, most recently requested first.
    async fn list_history(&self, driver_id: i64) -> Result<Vec<Ride>, Error>;

    async fn find_active_ride(&self, driver_id: i64) -> Result<Option<Ride>, Error>;
}

#[async_trait]
pub trait DeadlineAPI {
    async fn enforce_deadlines(&self) -> Result<SweepReport, Error>;
}

pub trait API: RideAPI + RideQueryAPI + DeadlineAPI {}
