use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, TimingBasis};
use crate::entities::{Coordinates, Location};
use crate::error::{forbidden_error, invalid_transition_error, validation_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: i64,
    pub passenger_id: i64,
    /// Zero until a driver accepts the ride.
    pub driver_id: i64,
    pub origin: Location,
    pub destination: Location,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub estimated_duration_minutes: i64,
    pub price: f64,
    pub bonus_applied: bool,
    pub rating: Option<u8>,
    pub status: Status,
    pub is_late: bool,
    pub cancellation_reason: Option<String>,
    pub driver_lat: Option<f64>,
    pub driver_lng: Option<f64>,
    pub revision: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Searching,
    DriverFound,
    InProgress,
    CompletedEarly,
    CompletedOnTime,
    CompletedLate,
    CancelledTimeout,
    CancelledByRider,
    CancelledByDriver,
}

/// What the timeout monitor did to a ride on one sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineAction {
    TimedOut,
    FlaggedLate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RideRequest {
    pub passenger_id: i64,
    pub origin: Location,
    pub destination: Location,
    pub estimated_duration_minutes: Option<i64>,
    pub price: Option<f64>,
}

/// Longest estimate a ride may carry, one day.
pub const MAX_ESTIMATED_MINUTES: i64 = 24 * 60;

const TIMEOUT_REASON: &str = "ride exceeded its estimated duration plus grace window";

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Searching => "SEARCHING",
            Self::DriverFound => "DRIVER_FOUND",
            Self::InProgress => "IN_PROGRESS",
            Self::CompletedEarly => "COMPLETED_EARLY",
            Self::CompletedOnTime => "COMPLETED_ON_TIME",
            Self::CompletedLate => "COMPLETED_LATE",
            Self::CancelledTimeout => "CANCELLED_TIMEOUT",
            Self::CancelledByRider => "CANCELLED_BY_RIDER",
            Self::CancelledByDriver => "CANCELLED_BY_DRIVER",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            Self::CompletedEarly | Self::CompletedOnTime | Self::CompletedLate
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::CancelledTimeout | Self::CancelledByRider | Self::CancelledByDriver
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_completed() || self.is_cancelled()
    }

    /// Statuses in which a driver is attached to the ride.
    pub fn requires_driver(&self) -> bool {
        matches!(self, Self::DriverFound | Self::InProgress | Self::CancelledByDriver) || self.is_completed()
    }
}

impl RideRequest {
    pub fn new(passenger_id: i64, origin: Location, destination: Location) -> Self {
        Self {
            passenger_id,
            origin,
            destination,
            estimated_duration_minutes: None,
            price: None,
        }
    }

    pub fn with_estimated_duration(mut self, minutes: i64) -> Self {
        self.estimated_duration_minutes = Some(minutes);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.passenger_id <= 0 {
            return Err(validation_error("passenger id is required"));
        }

        Coordinates::new(self.origin.coordinates.lat, self.origin.coordinates.lng)?;
        Coordinates::new(self.destination.coordinates.lat, self.destination.coordinates.lng)?;

        if matches!(self.estimated_duration_minutes, Some(minutes) if minutes <= 0) {
            return Err(validation_error("estimated duration must be positive"));
        }

        if matches!(self.estimated_duration_minutes, Some(minutes) if minutes > MAX_ESTIMATED_MINUTES) {
            return Err(validation_error(format!(
                "estimated duration must not exceed {} minutes",
                MAX_ESTIMATED_MINUTES
            )));
        }

        if matches!(self.price, Some(price) if !price.is_finite() || price < 0.0) {
            return Err(validation_error("price must be a non-negative amount"));
        }

        Ok(())
    }
}

impl Ride {
    /// Builds an unsaved ride; the store assigns the id on insert.
    pub fn new(request: RideRequest, config: &EngineConfig, now: DateTime<Utc>) -> Result<Self, Error> {
        request.validate()?;

        let distance_km = request
            .origin
            .coordinates
            .distance_km(&request.destination.coordinates);

        let estimated_duration_minutes = request.estimated_duration_minutes.unwrap_or_else(|| {
            ((distance_km / config.speed_km_per_min).ceil() as i64).clamp(1, MAX_ESTIMATED_MINUTES)
        });
        let price = request
            .price
            .unwrap_or_else(|| round_cents(distance_km * config.price_per_km));

        Ok(Self {
            id: 0,
            passenger_id: request.passenger_id,
            driver_id: 0,
            origin: request.origin,
            destination: request.destination,
            requested_at: now,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            estimated_duration_minutes,
            price,
            bonus_applied: false,
            rating: None,
            status: Status::Searching,
            is_late: false,
            cancellation_reason: None,
            driver_lat: None,
            driver_lng: None,
            revision: 0,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn driver_position(&self) -> Option<Coordinates> {
        match (self.driver_lat, self.driver_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    pub fn accept(&mut self, driver_id: i64, now: DateTime<Utc>) -> Result<(), Error> {
        if driver_id <= 0 {
            return Err(validation_error("driver id is required"));
        }

        match self.status {
            Status::Searching => {
                self.driver_id = driver_id;
                self.accepted_at = Some(now);
                self.status = Status::DriverFound;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    pub fn update_position(&mut self, position: Coordinates) -> Result<(), Error> {
        if self.is_terminal() {
            return Err(invalid_transition_error());
        }

        self.driver_lat = Some(position.lat);
        self.driver_lng = Some(position.lng);
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            Status::DriverFound => {
                self.started_at = Some(now);
                self.status = Status::InProgress;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// Decides the outcome of an in-progress ride. Exactly `estimated` counts as
    /// on time; exactly `estimated + grace` still completes.
    pub fn finalize(&mut self, now: DateTime<Utc>, config: &EngineConfig) -> Result<Status, Error> {
        if self.status != Status::InProgress {
            return Err(invalid_transition_error());
        }

        let basis = match config.finalize_basis {
            TimingBasis::Started => self.started_at.unwrap_or(self.requested_at),
            TimingBasis::Requested => self.requested_at,
        };

        let elapsed = now - basis;
        let (estimated, deadline) = self.windows(config.grace_minutes)?;

        if elapsed > deadline {
            self.time_out(now);
            return Ok(self.status);
        }

        // a late flag from an earlier sweep gives way to the actual outcome
        self.status = if elapsed < estimated {
            self.bonus_applied = true;
            self.price = round_cents(self.price + config.early_bonus);
            Status::CompletedEarly
        } else if elapsed > estimated {
            Status::CompletedLate
        } else {
            Status::CompletedOnTime
        };
        self.is_late = self.status == Status::CompletedLate;
        self.completed_at = Some(now);

        Ok(self.status)
    }

    pub fn cancel_by_rider(&mut self, now: DateTime<Utc>, reason: Option<String>) -> Result<(), Error> {
        match self.status {
            Status::Searching | Status::DriverFound => {
                self.cancel(Status::CancelledByRider, now, reason.unwrap_or_else(|| "cancelled by rider".into()));
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    pub fn cancel_by_driver(
        &mut self,
        driver_id: i64,
        now: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<(), Error> {
        if self.is_terminal() || self.status == Status::InProgress {
            return Err(invalid_transition_error());
        }

        if self.driver_id == 0 || self.driver_id != driver_id {
            return Err(forbidden_error());
        }

        self.cancel(Status::CancelledByDriver, now, reason.unwrap_or_else(|| "cancelled by driver".into()));
        Ok(())
    }

    pub fn rate(&mut self, rating: i64) -> Result<(), Error> {
        let rating = match u8::try_from(rating) {
            Ok(rating) if (1..=5).contains(&rating) => rating,
            _ => return Err(validation_error("rating must be between 1 and 5")),
        };

        if !self.status.is_completed() || self.rating.is_some() {
            return Err(invalid_transition_error());
        }

        self.rating = Some(rating);
        Ok(())
    }

    /// Applies the wall-clock deadline measured from `requested_at`.
    pub fn enforce_deadline(
        &mut self,
        now: DateTime<Utc>,
        grace_minutes: i64,
    ) -> Result<Option<DeadlineAction>, Error> {
        if self.is_terminal() {
            return Err(invalid_transition_error());
        }

        let elapsed = now - self.requested_at;
        let (estimated, deadline) = self.windows(grace_minutes)?;

        if elapsed > deadline {
            self.time_out(now);
            return Ok(Some(DeadlineAction::TimedOut));
        }

        let underway = matches!(self.status, Status::DriverFound | Status::InProgress);

        if underway && elapsed > estimated && !self.is_late {
            self.is_late = true;
            return Ok(Some(DeadlineAction::FlaggedLate));
        }

        Ok(None)
    }

    /// Checks the record-level invariants; returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err(format!("ride has non-positive id {}", self.id));
        }

        if self.status.requires_driver() && self.driver_id == 0 {
            return Err(format!("ride {} is {} without a driver", self.id, self.status.name()));
        }

        match (self.completed_at, self.cancelled_at) {
            (Some(_), Some(_)) => {
                return Err(format!("ride {} is both completed and cancelled", self.id));
            }
            (Some(_), None) if !self.status.is_completed() => {
                return Err(format!("ride {} has completed_at but is {}", self.id, self.status.name()));
            }
            (None, Some(_)) if !self.status.is_cancelled() => {
                return Err(format!("ride {} has cancelled_at but is {}", self.id, self.status.name()));
            }
            (None, None) if self.is_terminal() => {
                return Err(format!("ride {} is terminal without a terminal timestamp", self.id));
            }
            _ => {}
        }

        if self.bonus_applied != (self.status == Status::CompletedEarly) {
            return Err(format!("ride {} has bonus_applied out of step with {}", self.id, self.status.name()));
        }

        if self.rating.is_some() && !self.status.is_completed() {
            return Err(format!("ride {} is rated but not completed", self.id));
        }

        match self.status {
            Status::CompletedEarly | Status::CompletedOnTime if self.is_late => {
                return Err(format!("ride {} is {} but flagged late", self.id, self.status.name()));
            }
            Status::CompletedLate | Status::CancelledTimeout if !self.is_late => {
                return Err(format!("ride {} is {} but not flagged late", self.id, self.status.name()));
            }
            _ => {}
        }

        Ok(())
    }

    /// The estimate and the estimate plus grace, or a validation error when
    /// either does not fit in a duration.
    fn windows(&self, grace_minutes: i64) -> Result<(Duration, Duration), Error> {
        let out_of_range = || validation_error(format!("ride {} has an out of range time window", self.id));

        let estimated = Duration::try_minutes(self.estimated_duration_minutes).ok_or_else(out_of_range)?;
        let grace = Duration::try_minutes(grace_minutes).ok_or_else(out_of_range)?;
        let deadline = estimated.checked_add(&grace).ok_or_else(out_of_range)?;

        Ok((estimated, deadline))
    }

    fn time_out(&mut self, now: DateTime<Utc>) {
        self.is_late = true;
        self.cancel(Status::CancelledTimeout, now, TIMEOUT_REASON.into());
    }

    fn cancel(&mut self, status: Status, now: DateTime<Utc>, reason: String) {
        self.status = status;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason);
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
fn sample_ride(estimated_minutes: i64, now: DateTime<Utc>) -> Ride {
    let origin = Location::new(Coordinates { lat: -8.0476, lng: -34.8770 }, "Marco Zero".into());
    let destination = Location::new(Coordinates { lat: -8.0089, lng: -34.8553 }, "Olinda".into());
    let request = RideRequest::new(1, origin, destination)
        .with_estimated_duration(estimated_minutes)
        .with_price(30.0);

    let mut ride = Ride::new(request, &EngineConfig::default(), now).unwrap();
    ride.id = 1;
    ride
}

#[cfg(test)]
fn in_progress_ride(estimated_minutes: i64, started: DateTime<Utc>) -> Ride {
    let mut ride = sample_ride(estimated_minutes, started);
    ride.accept(42, started).unwrap();
    ride.start(started).unwrap();
    ride
}

#[test]
fn new_ride_derives_estimates_from_distance() {
    let origin = Location::new(Coordinates { lat: -8.0476, lng: -34.8770 }, "".into());
    let destination = Location::new(Coordinates { lat: -8.0089, lng: -34.8553 }, "".into());
    let config = EngineConfig::default();

    let ride = Ride::new(RideRequest::new(7, origin, destination), &config, Utc::now()).unwrap();

    // ~4.9 km at 0.5 km/min
    assert_eq!(ride.estimated_duration_minutes, 10);
    assert!((ride.price - 12.3).abs() < 0.2, "got {}", ride.price);
    assert_eq!(ride.status, Status::Searching);
    assert_eq!(ride.driver_id, 0);
    assert!(ride.check_invariants().is_err(), "unsaved rides have no id yet");
}

#[test]
fn derived_estimates_are_capped_at_one_day() {
    let origin = Location::new(Coordinates { lat: -8.0476, lng: -34.8770 }, "".into());
    let destination = Location::new(Coordinates { lat: -8.0089, lng: -34.8553 }, "".into());
    let config = EngineConfig {
        speed_km_per_min: 1e-12,
        ..EngineConfig::default()
    };

    let ride = Ride::new(RideRequest::new(7, origin, destination), &config, Utc::now()).unwrap();
    assert_eq!(ride.estimated_duration_minutes, MAX_ESTIMATED_MINUTES);
}

#[test]
fn oversized_windows_fail_without_changing_the_ride() {
    let now = Utc::now();

    let mut waiting = sample_ride(10, now);
    waiting.estimated_duration_minutes = i64::MAX;
    let before = waiting.clone();
    let err = waiting.enforce_deadline(now + Duration::minutes(30), 15).unwrap_err();
    assert!(err.is_validation_error());
    assert_eq!(waiting, before);

    let mut underway = in_progress_ride(10, now);
    underway.estimated_duration_minutes = i64::MAX / 60_000;
    let before = underway.clone();
    assert!(underway
        .finalize(now + Duration::minutes(5), &EngineConfig::default())
        .unwrap_err()
        .is_validation_error());
    assert_eq!(underway, before);
}

#[test]
fn request_validation() {
    let here = Location::new(Coordinates { lat: 0.0, lng: 0.0 }, "".into());
    let config = EngineConfig::default();

    let missing_passenger = RideRequest::new(0, here.clone(), here.clone());
    assert!(Ride::new(missing_passenger, &config, Utc::now()).unwrap_err().is_validation_error());

    let zero_estimate = RideRequest::new(1, here.clone(), here.clone()).with_estimated_duration(0);
    assert!(zero_estimate.validate().unwrap_err().is_validation_error());

    let endless_estimate = RideRequest::new(1, here.clone(), here.clone()).with_estimated_duration(i64::MAX);
    assert!(endless_estimate.validate().unwrap_err().is_validation_error());

    let day_long = RideRequest::new(1, here.clone(), here.clone()).with_estimated_duration(MAX_ESTIMATED_MINUTES);
    assert!(day_long.validate().is_ok());

    let negative_price = RideRequest::new(1, here.clone(), here.clone()).with_price(-1.0);
    assert!(negative_price.validate().unwrap_err().is_validation_error());

    let mut bad_origin = RideRequest::new(1, here.clone(), here);
    bad_origin.origin.coordinates.lat = 120.0;
    assert!(bad_origin.validate().unwrap_err().is_validation_error());
}

#[test]
fn transitions_follow_the_table() {
    let now = Utc::now();
    let mut ride = sample_ride(20, now);

    assert!(ride.start(now).unwrap_err().is_invalid_transition_error());
    assert!(ride.finalize(now, &EngineConfig::default()).unwrap_err().is_invalid_transition_error());

    ride.accept(42, now).unwrap();
    assert_eq!(ride.status, Status::DriverFound);
    assert_eq!(ride.accepted_at, Some(now));
    assert!(ride.accept(43, now).unwrap_err().is_invalid_transition_error());
    assert_eq!(ride.driver_id, 42);

    ride.start(now).unwrap();
    assert_eq!(ride.status, Status::InProgress);
    assert!(ride.cancel_by_rider(now, None).unwrap_err().is_invalid_transition_error());
    assert!(ride.check_invariants().is_ok());
}

#[test]
fn finalize_boundaries() {
    let started = Utc::now();
    let config = EngineConfig::default();

    let cases = [
        (Duration::zero(), Status::CompletedEarly),
        (Duration::minutes(20) - Duration::seconds(1), Status::CompletedEarly),
        (Duration::minutes(20), Status::CompletedOnTime),
        (Duration::minutes(20) + Duration::seconds(1), Status::CompletedLate),
        (Duration::minutes(35), Status::CompletedLate),
        (Duration::minutes(35) + Duration::seconds(1), Status::CancelledTimeout),
    ];

    for (elapsed, expected) in cases {
        let mut ride = in_progress_ride(20, started);
        let status = ride.finalize(started + elapsed, &config).unwrap();

        assert_eq!(status, expected, "elapsed {:?}", elapsed);
        assert_eq!(ride.status, expected);
        assert!(ride.check_invariants().is_ok(), "{:?}", ride.check_invariants());
    }
}

#[test]
fn finalize_early_applies_bonus_once() {
    let started = Utc::now();
    let config = EngineConfig::default();
    let mut ride = in_progress_ride(20, started);

    ride.finalize(started + Duration::minutes(5), &config).unwrap();

    assert!(ride.bonus_applied);
    assert_eq!(ride.price, 35.0);
    assert_eq!(ride.completed_at, Some(started + Duration::minutes(5)));
    assert_eq!(ride.cancelled_at, None);

    let before = ride.clone();
    assert!(ride.finalize(started + Duration::minutes(6), &config).unwrap_err().is_invalid_transition_error());
    assert_eq!(ride, before);
}

#[test]
fn finalize_basis_is_configurable() {
    let requested = Utc::now();
    let mut ride = sample_ride(20, requested);
    let started = requested + Duration::minutes(10);
    ride.accept(42, requested).unwrap();
    ride.start(started).unwrap();

    let mut by_request = ride.clone();
    let config = EngineConfig {
        finalize_basis: TimingBasis::Requested,
        ..EngineConfig::default()
    };

    // 15 minutes of driving, 25 since the request
    let finished = started + Duration::minutes(15);
    assert_eq!(ride.finalize(finished, &EngineConfig::default()).unwrap(), Status::CompletedEarly);
    assert_eq!(by_request.finalize(finished, &config).unwrap(), Status::CompletedLate);
}

#[test]
fn driver_cancellation_checks_status_before_identity() {
    let now = Utc::now();

    let mut searching = sample_ride(20, now);
    assert!(searching.cancel_by_driver(42, now, None).unwrap_err().is_forbidden_error());

    let mut assigned = sample_ride(20, now);
    assigned.accept(42, now).unwrap();
    assert!(assigned.cancel_by_driver(99, now, None).unwrap_err().is_forbidden_error());
    assert_eq!(assigned.status, Status::DriverFound);

    let mut underway = in_progress_ride(20, now);
    assert!(underway.cancel_by_driver(99, now, None).unwrap_err().is_invalid_transition_error());
    assert!(underway.cancel_by_driver(42, now, None).unwrap_err().is_invalid_transition_error());

    assigned.cancel_by_driver(42, now, Some("flat tyre".into())).unwrap();
    assert_eq!(assigned.status, Status::CancelledByDriver);
    assert_eq!(assigned.cancellation_reason.as_deref(), Some("flat tyre"));
    assert!(assigned.check_invariants().is_ok());
}

#[test]
fn rating_requires_completion() {
    let started = Utc::now();
    let mut ride = in_progress_ride(20, started);

    assert!(ride.rate(4).unwrap_err().is_invalid_transition_error());
    assert!(ride.rate(6).unwrap_err().is_validation_error());

    ride.finalize(started + Duration::minutes(20), &EngineConfig::default()).unwrap();
    assert!(ride.rate(0).unwrap_err().is_validation_error());

    ride.rate(5).unwrap();
    assert_eq!(ride.rating, Some(5));
    assert!(ride.rate(3).unwrap_err().is_invalid_transition_error());
    assert_eq!(ride.rating, Some(5));
}

#[test]
fn positions_update_until_terminal() {
    let now = Utc::now();
    let mut ride = sample_ride(20, now);

    ride.update_position(Coordinates { lat: -8.05, lng: -34.88 }).unwrap();
    assert_eq!(ride.driver_position(), Some(Coordinates { lat: -8.05, lng: -34.88 }));
    assert_eq!(ride.status, Status::Searching);

    ride.cancel_by_rider(now, None).unwrap();
    assert!(ride
        .update_position(Coordinates { lat: 0.0, lng: 0.0 })
        .unwrap_err()
        .is_invalid_transition_error());
}

#[test]
fn deadline_flags_late_then_times_out() {
    let requested = Utc::now();
    let mut ride = sample_ride(10, requested);
    ride.accept(42, requested).unwrap();

    assert_eq!(ride.enforce_deadline(requested + Duration::minutes(10), 15).unwrap(), None);
    assert_eq!(
        ride.enforce_deadline(requested + Duration::minutes(11), 15).unwrap(),
        Some(DeadlineAction::FlaggedLate)
    );
    assert_eq!(ride.enforce_deadline(requested + Duration::minutes(12), 15).unwrap(), None);
    assert_eq!(ride.status, Status::DriverFound);

    assert_eq!(ride.enforce_deadline(requested + Duration::minutes(25), 15).unwrap(), None);
    assert_eq!(
        ride.enforce_deadline(requested + Duration::minutes(25) + Duration::seconds(1), 15).unwrap(),
        Some(DeadlineAction::TimedOut)
    );
    assert_eq!(ride.status, Status::CancelledTimeout);
    assert!(ride.check_invariants().is_ok());

    assert!(ride
        .enforce_deadline(requested + Duration::minutes(30), 15)
        .unwrap_err()
        .is_invalid_transition_error());
}

#[test]
fn finalize_replaces_an_earlier_late_flag() {
    let requested = Utc::now();
    let mut ride = sample_ride(10, requested);
    ride.accept(42, requested).unwrap();

    assert_eq!(
        ride.enforce_deadline(requested + Duration::minutes(11), 15).unwrap(),
        Some(DeadlineAction::FlaggedLate)
    );

    ride.start(requested + Duration::minutes(11)).unwrap();
    let status = ride.finalize(requested + Duration::minutes(13), &EngineConfig::default()).unwrap();

    assert_eq!(status, Status::CompletedEarly);
    assert!(ride.bonus_applied);
    assert!(!ride.is_late);
    assert!(ride.check_invariants().is_ok(), "{:?}", ride.check_invariants());

    ride.is_late = true;
    assert!(ride.check_invariants().is_err());
}

#[test]
fn searching_rides_are_never_flagged_late() {
    let requested = Utc::now();
    let mut ride = sample_ride(1, requested);

    assert_eq!(ride.enforce_deadline(requested + Duration::minutes(5), 15).unwrap(), None);
    assert!(!ride.is_late);

    assert_eq!(
        ride.enforce_deadline(requested + Duration::minutes(17), 15).unwrap(),
        Some(DeadlineAction::TimedOut)
    );
}

#[test]
fn status_serializes_in_screaming_case() {
    let json = serde_json::to_string(&Status::CompletedOnTime).unwrap();
    assert_eq!(json, "\"COMPLETED_ON_TIME\"");
    assert_eq!(Status::CancelledByDriver.name(), "CANCELLED_BY_DRIVER");
}
