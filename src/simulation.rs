use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use chrono::Duration;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::api::{DeadlineAPI, RideAPI, RideQueryAPI};
use crate::clock::ManualClock;
use crate::engine::Engine;
use crate::entities::{Coordinates, Location, RideRequest, RideStatus};
use crate::error::{Error, ErrorKind};

const PLACES: [(&str, f64, f64); 8] = [
    ("Marco Zero", -8.0631, -34.8711),
    ("Olinda", -8.0089, -34.8553),
    ("Boa Viagem", -8.1186, -34.9011),
    ("Casa Forte", -8.0353, -34.9187),
    ("Aeroporto", -8.1264, -34.9236),
    ("Derby", -8.0569, -34.8991),
    ("Madalena", -8.0546, -34.9091),
    ("Pina", -8.0886, -34.8853),
];

#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub riders: usize,
    pub drivers: i64,
    pub workers: usize,
    pub rounds: usize,
    /// Simulated minutes that pass between rounds.
    pub minutes_per_round: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            riders: 200,
            drivers: 40,
            workers: 16,
            rounds: 12,
            minutes_per_round: 3,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SimulationReport {
    pub rides: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub timed_out: usize,
    pub active: usize,
    pub rejected_calls: usize,
    pub notifications: usize,
    pub violations: Vec<String>,
}

fn chance(p: f64) -> bool {
    rand::thread_rng().gen_bool(p)
}

struct Simulation {
    e: Arc<Engine>,
    clock: ManualClock,
    drivers: i64,
    rejected: AtomicUsize,
    violations: Mutex<Vec<String>>,
}

impl Simulation {
    fn sample_location(&self) -> Location {
        let (description, lat, lng) = PLACES[rand::thread_rng().gen_range(0..PLACES.len())];

        Location::new(Coordinates { lat, lng }, description.into())
    }

    fn sample_driver(&self) -> i64 {
        rand::thread_rng().gen_range(1..=self.drivers)
    }

    /// Losing a race is expected; anything internal is a violation.
    async fn handle_invocation_error<T>(&self, result: Result<T, Error>) {
        if let Err(err) = result {
            if err.kind() == ErrorKind::Internal {
                tracing::error!(%err, "internal error during simulation");
                self.violations.lock().await.push(err.to_string());
            } else {
                tracing::debug!(%err, "call rejected");
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn add_ride(&self, passenger_id: i64) {
        let origin = self.sample_location();
        let mut destination = self.sample_location();
        while destination.description == origin.description {
            destination = self.sample_location();
        }

        let result = self
            .e
            .request_ride(RideRequest::new(passenger_id, origin, destination))
            .await;

        self.handle_invocation_error(result).await;
    }

    #[tracing::instrument(skip(self))]
    async fn step(&self, ride_id: i64) {
        let ride = match self.e.get_ride(ride_id).await {
            Ok(ride) => ride,
            Err(err) => return self.handle_invocation_error::<()>(Err(err)).await,
        };

        match ride.status {
            RideStatus::Searching => {
                if chance(0.7) {
                    let driver_id = self.sample_driver();
                    self.handle_invocation_error(self.e.accept_ride(ride.id, driver_id).await)
                        .await;
                } else if chance(0.05) {
                    self.handle_invocation_error(self.e.cancel_by_rider(ride.id, None).await)
                        .await;
                }
            }
            RideStatus::DriverFound => {
                if chance(0.6) {
                    self.handle_invocation_error(self.e.start_ride(ride.id).await)
                        .await;
                } else if chance(0.1) {
                    // now and then the wrong driver tries to cancel
                    let driver_id = if chance(0.2) {
                        self.sample_driver()
                    } else {
                        ride.driver_id
                    };
                    let reason = Some("driver unavailable".to_string());
                    self.handle_invocation_error(
                        self.e.cancel_by_driver(ride.id, driver_id, reason).await,
                    )
                    .await;
                } else if chance(0.05) {
                    self.handle_invocation_error(self.e.cancel_by_rider(ride.id, None).await)
                        .await;
                }
            }
            RideStatus::InProgress => {
                let position = self.sample_location().coordinates;
                self.handle_invocation_error(self.e.update_position(ride.id, position).await)
                    .await;

                if chance(0.4) {
                    self.handle_invocation_error(self.e.finalize_ride(ride.id).await)
                        .await;
                }
            }
            _ => {
                // terminal rides still attract stray calls
                if chance(0.1) {
                    self.handle_invocation_error(self.e.finalize_ride(ride.id).await)
                        .await;
                }
            }
        }
    }
}

/// Drives concurrent riders and drivers against one engine while deadline
/// sweeps run alongside, then audits every ride.
pub struct Executor {
    s: Arc<Simulation>,
    config: SimulationConfig,
}

impl Executor {
    #[tracing::instrument(name = "Executor::new", skip_all)]
    pub fn new(engine: Arc<Engine>, clock: ManualClock, config: SimulationConfig) -> Self {
        Self {
            s: Arc::new(Simulation {
                e: engine,
                clock,
                drivers: config.drivers.max(1),
                rejected: AtomicUsize::new(0),
                violations: Mutex::new(Vec::new()),
            }),
            config,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<SimulationReport, Error> {
        let mut notifications = 0;

        self.initialize_rides().await;
        notifications += self.drain_notifications();

        for round in 0..self.config.rounds {
            let (_, sweep) = tokio::join!(self.run_round(), self.s.e.enforce_deadlines());
            self.s.handle_invocation_error(sweep).await;

            self.s.clock.advance(Duration::minutes(self.config.minutes_per_round));
            notifications += self.drain_notifications();

            tracing::info!(round, "simulation round finished");
        }

        self.s.handle_invocation_error(self.s.e.enforce_deadlines().await).await;
        self.rate_completed().await;
        notifications += self.drain_notifications();

        let report = self.audit(notifications).await?;

        tracing::info!(
            rides = report.rides,
            completed = report.completed,
            cancelled = report.cancelled,
            timed_out = report.timed_out,
            violations = report.violations.len(),
            "simulation finished"
        );

        Ok(report)
    }

    #[tracing::instrument(skip(self))]
    async fn initialize_rides(&self) {
        let (tx, rx): (Sender<i64>, Receiver<i64>) = async_channel::unbounded();

        let mut handles = vec![];
        for _ in 0..self.config.workers.max(1) {
            let rx = rx.clone();
            let s = self.s.clone();

            handles.push(tokio::spawn(async move {
                while let Ok(passenger_id) = rx.recv().await {
                    s.add_ride(passenger_id).await;
                }
            }));
        }

        for passenger_id in 1..=self.config.riders as i64 {
            if tx.send(passenger_id).await.is_err() {
                break;
            }
        }
        drop(tx);

        futures::future::join_all(handles).await;
    }

    #[tracing::instrument(skip(self))]
    async fn run_round(&self) {
        let (tx, rx): (Sender<i64>, Receiver<i64>) = async_channel::unbounded();

        let mut handles = vec![];
        for _ in 0..self.config.workers.max(1) {
            let rx = rx.clone();
            let s = self.s.clone();

            handles.push(tokio::spawn(async move {
                while let Ok(ride_id) = rx.recv().await {
                    s.step(ride_id).await;
                }
            }));
        }

        for ride in self.s.e.store().list_where(|ride| !ride.is_terminal()).await {
            // duplicates make two workers race on the same ride
            let copies = if chance(0.1) { 2 } else { 1 };
            for _ in 0..copies {
                if tx.send(ride.id).await.is_err() {
                    break;
                }
            }
        }
        drop(tx);

        futures::future::join_all(handles).await;
    }

    async fn rate_completed(&self) {
        let completed = self
            .s
            .e
            .store()
            .list_where(|ride| ride.status.is_completed())
            .await;

        for ride in completed {
            if chance(0.5) {
                let rating = rand::thread_rng().gen_range(1..=5);
                self.s
                    .handle_invocation_error(self.s.e.rate_ride(ride.id, rating).await)
                    .await;
            }
        }
    }

    fn drain_notifications(&self) -> usize {
        let receiver = self.s.e.notifications();
        let mut count = 0;

        while receiver.try_recv().is_ok() {
            count += 1;
        }

        count
    }

    async fn audit(&self, notifications: usize) -> Result<SimulationReport, Error> {
        let rides = self.s.e.list_rides().await?;
        let mut report = SimulationReport {
            rides: rides.len(),
            rejected_calls: self.s.rejected.load(Ordering::Relaxed),
            notifications,
            violations: self.s.violations.lock().await.clone(),
            ..SimulationReport::default()
        };

        for ride in &rides {
            match ride.status {
                RideStatus::CancelledTimeout => report.timed_out += 1,
                status if status.is_completed() => report.completed += 1,
                status if status.is_cancelled() => report.cancelled += 1,
                _ => report.active += 1,
            }

            if let Err(violation) = ride.check_invariants() {
                report.violations.push(violation);
            }
        }

        Ok(report)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simulation_keeps_every_ride_consistent() {
    use crate::config::EngineConfig;
    use crate::engine::RideStore;

    let clock = ManualClock::default();
    let engine = Engine::new(EngineConfig::default(), RideStore::new(), Arc::new(clock.clone()));

    let config = SimulationConfig {
        riders: 40,
        drivers: 8,
        workers: 6,
        rounds: 10,
        minutes_per_round: 4,
    };
    let report = Executor::new(Arc::new(engine), clock, config).run().await.unwrap();

    assert_eq!(report.rides, 40);
    assert!(report.violations.is_empty(), "{:?}", report.violations);
    assert_eq!(
        report.completed + report.cancelled + report.timed_out + report.active,
        report.rides
    );
}
