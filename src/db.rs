use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, Pool, Postgres};
use tokio::sync::Mutex;

use crate::entities::Ride;
use crate::error::Error;

/// Durable copy of the ride collection. The in-memory store stays the
/// source of truth; a mirror only has to keep the newest revision of each
/// ride it has been handed.
#[async_trait]
pub trait RideMirror: Send + Sync {
    async fn save(&self, ride: &Ride) -> Result<(), Error>;

    async fn load(&self) -> Result<Vec<Ride>, Error>;
}

/// Keeps every ride in one pretty-printed JSON array, rewritten through a
/// temporary file on each save.
#[derive(Debug)]
pub struct JsonFileMirror {
    path: PathBuf,
    rides: Mutex<BTreeMap<i64, Ride>>,
}

impl JsonFileMirror {
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        let rides = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice::<Vec<Ride>>(&bytes)?
                .into_iter()
                .map(|ride| (ride.id, ride))
                .collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(rides = rides.len(), "opened ride state file");

        Ok(Self {
            path,
            rides: Mutex::new(rides),
        })
    }
}

#[async_trait]
impl RideMirror for JsonFileMirror {
    async fn save(&self, ride: &Ride) -> Result<(), Error> {
        let mut rides = self.rides.lock().await;

        if let Some(stored) = rides.get(&ride.id) {
            if stored.revision >= ride.revision {
                tracing::debug!(ride_id = ride.id, revision = ride.revision, "ignoring stale revision");
                return Ok(());
            }
        }

        rides.insert(ride.id, ride.clone());

        let snapshot: Vec<&Ride> = rides.values().collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }

    async fn load(&self) -> Result<Vec<Ride>, Error> {
        Ok(self.rides.lock().await.values().cloned().collect())
    }
}

/// Mirrors rides into a Postgres `rides` table, one JSONB document per ride.
pub struct PgMirror {
    pool: Pool<Postgres>,
}

impl PgMirror {
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS rides (id INT8 PRIMARY KEY, status VARCHAR NOT NULL, revision INT8 NOT NULL, data jsonb NOT NULL)")
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl RideMirror for PgMirror {
    async fn save(&self, ride: &Ride) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO rides (id, status, revision, data) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, revision = EXCLUDED.revision, data = EXCLUDED.data \
             WHERE rides.revision < EXCLUDED.revision",
        )
        .bind(ride.id)
        .bind(ride.status.name())
        .bind(ride.revision as i64)
        .bind(Json(ride))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self) -> Result<Vec<Ride>, Error> {
        let rows: Vec<(Json<Ride>,)> = sqlx::query_as("SELECT data FROM rides ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(Json(ride),)| ride).collect())
    }
}

#[cfg(test)]
fn stored_ride(id: i64, revision: u64) -> Ride {
    use crate::config::EngineConfig;
    use crate::entities::{Coordinates, Location, RideRequest};
    use chrono::Utc;

    let origin = Location::new(Coordinates { lat: -8.0631, lng: -34.8711 }, "Marco Zero".into());
    let destination = Location::new(Coordinates { lat: -8.0089, lng: -34.8553 }, "Olinda".into());
    let request = RideRequest::new(1, origin, destination);

    let mut ride = Ride::new(request, &EngineConfig::default(), Utc::now()).unwrap();
    ride.id = id;
    ride.revision = revision;
    ride
}

#[cfg(test)]
fn temp_state_path() -> PathBuf {
    std::env::temp_dir().join(format!("rideline-{}.json", uuid::Uuid::new_v4()))
}

#[test]
fn json_mirror_survives_reopen() {
    use tokio_test::block_on;

    let path = temp_state_path();

    let mirror = block_on(JsonFileMirror::open(&path)).unwrap();
    assert!(block_on(mirror.load()).unwrap().is_empty());

    block_on(mirror.save(&stored_ride(2, 1))).unwrap();
    block_on(mirror.save(&stored_ride(1, 3))).unwrap();

    let reopened = block_on(JsonFileMirror::open(&path)).unwrap();
    let rides = block_on(reopened.load()).unwrap();

    assert_eq!(rides.iter().map(|ride| ride.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(rides[0].revision, 3);
    assert!(!path.with_extension("tmp").exists());

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn json_mirror_ignores_stale_revisions() {
    use crate::entities::RideStatus;
    use tokio_test::block_on;

    let path = temp_state_path();
    let mirror = block_on(JsonFileMirror::open(&path)).unwrap();

    let mut newer = stored_ride(1, 4);
    newer.status = RideStatus::CancelledByRider;
    block_on(mirror.save(&newer)).unwrap();
    block_on(mirror.save(&stored_ride(1, 3))).unwrap();

    let reopened = block_on(JsonFileMirror::open(&path)).unwrap();
    let rides = block_on(reopened.load()).unwrap();

    assert_eq!(rides.len(), 1);
    assert_eq!(rides[0].status, RideStatus::CancelledByRider);
    assert_eq!(rides[0].revision, 4);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn json_mirror_rejects_corrupt_files() {
    use tokio_test::block_on;

    let path = temp_state_path();
    std::fs::write(&path, b"{ not json").unwrap();

    let err = block_on(JsonFileMirror::open(&path)).unwrap_err();
    assert!(!err.is_not_found_error());

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
#[ignore = "needs a running Postgres at DATABASE_URL"]
async fn pg_mirror_keeps_newest_revision() {
    let uri = std::env::var("DATABASE_URL").unwrap();
    let mirror = PgMirror::new(&uri, 2).await.unwrap();

    let id = i64::from(rand::random::<u32>()) + 1_000_000;
    mirror.save(&stored_ride(id, 2)).await.unwrap();
    mirror.save(&stored_ride(id, 1)).await.unwrap();

    let rides = mirror.load().await.unwrap();
    let ride = rides.iter().find(|ride| ride.id == id).unwrap();
    assert_eq!(ride.revision, 2);
}
