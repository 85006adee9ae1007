mod deadline_api;
mod helpers;
mod query_api;
mod ride_api;
mod store;

pub use store::RideStore;

#[cfg(test)]
pub(crate) use helpers::{test_engine, test_request};

use std::sync::Arc;

use async_channel::{Receiver, Sender};

use crate::{
    api::API,
    clock::Clock,
    config::EngineConfig,
    db::RideMirror,
    entities::Notification,
};

/// The ride lifecycle engine. All mutation of rides goes through its
/// operations, which run their read-check-write under the store's lock.
pub struct Engine {
    store: RideStore,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    mirror: Option<Arc<dyn RideMirror>>,
    outbox: Sender<Notification>,
    // keeps the channel open while no dispatcher is subscribed
    inbox: Receiver<Notification>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(config: EngineConfig, store: RideStore, clock: Arc<dyn Clock>) -> Self {
        let (outbox, inbox) = async_channel::bounded(config.notification_capacity.max(1));

        Self {
            store,
            config,
            clock,
            mirror: None,
            outbox,
            inbox,
        }
    }

    /// Mirrors every committed status change to `mirror` after the store lock is released.
    pub fn with_mirror(mut self, mirror: Arc<dyn RideMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn store(&self) -> &RideStore {
        &self.store
    }

    /// Receiver for outbound notifications. Receivers compete for events, so a
    /// deployment should run a single dispatcher.
    pub fn notifications(&self) -> Receiver<Notification> {
        self.inbox.clone()
    }
}

impl API for Engine {}
