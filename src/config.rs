use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{validation_error, Error};

/// Which timestamp the finalize decision measures elapsed time from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingBasis {
    Requested,
    Started,
}

impl FromStr for TimingBasis {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(Self::Requested),
            "started" => Ok(Self::Started),
            other => Err(validation_error(format!("unknown timing basis {:?}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub grace_minutes: i64,
    pub early_bonus: f64,
    pub finalize_basis: TimingBasis,
    pub price_per_km: f64,
    pub speed_km_per_min: f64,
    pub arrival_radius_km: f64,
    pub notification_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_minutes: 15,
            early_bonus: 5.0,
            finalize_basis: TimingBasis::Started,
            price_per_km: 2.5,
            speed_km_per_min: 0.5,
            arrival_radius_km: 0.05,
            notification_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Longest grace window accepted, one day.
    pub const MAX_GRACE_MINUTES: i64 = 24 * 60;

    pub fn validate(&self) -> Result<(), Error> {
        if !(0..=Self::MAX_GRACE_MINUTES).contains(&self.grace_minutes) {
            return Err(validation_error(format!(
                "grace minutes must be between 0 and {}",
                Self::MAX_GRACE_MINUTES
            )));
        }

        if self.speed_km_per_min <= 0.0 || self.notification_capacity == 0 {
            return Err(validation_error("engine settings out of range"));
        }

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub engine: EngineConfig,
    pub monitor_interval: Duration,
    pub server_addr: SocketAddr,
    pub state_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            monitor_interval: Duration::from_secs(30),
            server_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            state_path: None,
            database_url: None,
            database_max_connections: 5,
        }
    }
}

impl Config {
    /// Loads `.env` (if any) and overlays environment variables on the defaults.
    #[tracing::instrument(name = "Config::from_env")]
    pub fn from_env() -> Result<Self, Error> {
        if dotenv::dotenv().is_err() {
            tracing::debug!("no .env file found, using process environment");
        }

        let defaults = Config::default();
        let engine = EngineConfig {
            grace_minutes: parse_var("RIDES_GRACE_MINUTES", defaults.engine.grace_minutes)?,
            early_bonus: parse_var("RIDES_EARLY_BONUS", defaults.engine.early_bonus)?,
            finalize_basis: parse_var("RIDES_FINALIZE_BASIS", defaults.engine.finalize_basis)?,
            price_per_km: parse_var("RIDES_PRICE_PER_KM", defaults.engine.price_per_km)?,
            speed_km_per_min: parse_var("RIDES_SPEED_KM_PER_MIN", defaults.engine.speed_km_per_min)?,
            arrival_radius_km: parse_var(
                "RIDES_ARRIVAL_RADIUS_KM",
                defaults.engine.arrival_radius_km,
            )?,
            notification_capacity: parse_var(
                "RIDES_NOTIFICATION_CAPACITY",
                defaults.engine.notification_capacity,
            )?,
        };

        engine.validate()?;

        let monitor_secs: u64 = parse_var(
            "RIDES_MONITOR_INTERVAL_SECS",
            defaults.monitor_interval.as_secs(),
        )?;

        if monitor_secs == 0 {
            return Err(validation_error("RIDES_MONITOR_INTERVAL_SECS must be positive"));
        }

        let config = Self {
            engine,
            monitor_interval: Duration::from_secs(monitor_secs),
            server_addr: parse_var("RIDES_SERVER_ADDR", defaults.server_addr)?,
            state_path: optional_var("RIDES_STATE_PATH")?.map(PathBuf::from),
            database_url: optional_var("DATABASE_URL")?,
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
        };

        tracing::info!(
            monitor_interval_secs = monitor_secs,
            addr = %config.server_addr,
            "configuration loaded"
        );

        Ok(config)
    }
}

fn optional_var(name: &str) -> Result<Option<String>, Error> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, Error> {
    match optional_var(name)? {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| validation_error(format!("{} has an invalid value", name))),
        None => Ok(default),
    }
}

#[test]
fn timing_basis_parses_case_insensitively() {
    assert_eq!("Started".parse::<TimingBasis>().unwrap(), TimingBasis::Started);
    assert_eq!(" requested ".parse::<TimingBasis>().unwrap(), TimingBasis::Requested);
    assert!("pickup".parse::<TimingBasis>().unwrap_err().is_validation_error());
}

#[test]
fn engine_settings_are_bounded() {
    assert!(EngineConfig::default().validate().is_ok());

    for grace_minutes in [-1, EngineConfig::MAX_GRACE_MINUTES + 1, i64::MAX] {
        let config = EngineConfig {
            grace_minutes,
            ..EngineConfig::default()
        };
        assert!(config.validate().unwrap_err().is_validation_error(), "grace {}", grace_minutes);
    }

    let stalled = EngineConfig {
        speed_km_per_min: 0.0,
        ..EngineConfig::default()
    };
    assert!(stalled.validate().unwrap_err().is_validation_error());
}

#[test]
fn parse_var_reports_the_variable() {
    env::set_var("RIDELINE_TEST_BAD_NUMBER", "fifteen");

    let err = parse_var::<i64>("RIDELINE_TEST_BAD_NUMBER", 15).unwrap_err();
    assert!(err.is_validation_error());
    assert!(err.message.contains("RIDELINE_TEST_BAD_NUMBER"));

    env::remove_var("RIDELINE_TEST_BAD_NUMBER");
    assert_eq!(parse_var::<i64>("RIDELINE_TEST_BAD_NUMBER", 15).unwrap(), 15);
}
