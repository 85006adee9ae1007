use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::RideStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DriverFound,
    Arrival,
    Late,
    Completed,
    Cancelled,
    TimedOut,
}

/// Event handed to the notification dispatcher. Delivery is not the engine's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub ride_id: i64,
    pub status: RideStatus,
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        ride_id: i64,
        status: RideStatus,
        kind: NotificationKind,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id,
            status,
            kind,
            message: message.into(),
            timestamp,
        }
    }
}
