use super::Engine;

use async_channel::TrySendError;

use crate::entities::{Notification, NotificationKind, Ride};

impl Engine {
    /// Runs the side effects of a committed change. Called after the store
    /// lock is released so no I/O happens inside the critical section.
    #[tracing::instrument(skip(self, ride, message), fields(ride_id = ride.id, status = ride.status.name()))]
    pub(super) async fn committed(&self, ride: &Ride, kind: Option<NotificationKind>, message: String) {
        tracing::info!(revision = ride.revision, "{}", message);

        self.mirror(ride).await;

        if let Some(kind) = kind {
            self.notify(ride, kind, message);
        }
    }

    pub(super) async fn mirror(&self, ride: &Ride) {
        if let Some(mirror) = &self.mirror {
            if let Err(err) = mirror.save(ride).await {
                tracing::warn!(ride_id = ride.id, revision = ride.revision, %err, "failed to mirror ride");
            }
        }
    }

    pub(super) fn notify(&self, ride: &Ride, kind: NotificationKind, message: String) {
        let notification = Notification::new(ride.id, ride.status, kind, message, self.clock.now());

        match self.outbox.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    ride_id = dropped.ride_id,
                    kind = ?dropped.kind,
                    "notification channel full, dropping notification"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(ride_id = ride.id, "notification channel closed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_engine() -> (Engine, crate::clock::ManualClock) {
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::engine::RideStore;
    use std::sync::Arc;

    let clock = ManualClock::default();
    let engine = Engine::new(EngineConfig::default(), RideStore::new(), Arc::new(clock.clone()));

    (engine, clock)
}

#[cfg(test)]
pub(crate) fn test_request(passenger_id: i64, estimated_minutes: i64) -> crate::entities::RideRequest {
    use crate::entities::{Coordinates, Location, RideRequest};

    let origin = Location::new(Coordinates { lat: -8.0631, lng: -34.8711 }, "Marco Zero".into());
    let destination = Location::new(Coordinates { lat: -8.0089, lng: -34.8553 }, "Olinda".into());

    RideRequest::new(passenger_id, origin, destination)
        .with_estimated_duration(estimated_minutes)
        .with_price(30.0)
}
