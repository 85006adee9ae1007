mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::API;
use crate::error::{server_error, Error};
use crate::server::handlers::{drivers, monitor, rides};

pub type DynAPI = Arc<dyn API + Send + Sync>;

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/rides", post(rides::create).get(rides::list))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/accept", patch(rides::accept))
        .route("/rides/:id/start", patch(rides::start))
        .route("/rides/:id/position", patch(rides::update_position))
        .route("/rides/:id/finalize", patch(rides::finalize))
        .route("/rides/:id/cancel", patch(rides::cancel))
        .route("/rides/:id/driver/cancel", patch(rides::cancel_by_driver))
        .route("/rides/:id/rating", patch(rides::rate))
        .route("/drivers/:id/history", get(drivers::history))
        .route("/drivers/:id/location", post(drivers::update_location))
        .route("/monitor/sweep", post(monitor::sweep))
        .layer(Extension(api))
}

/// Serves the HTTP API on `addr` until `shutdown` resolves.
pub async fn serve<T, S>(api: Arc<T>, addr: SocketAddr, shutdown: S) -> Result<(), Error>
where
    T: API + Send + Sync + 'static,
    S: Future<Output = ()>,
{
    let app = router(api as DynAPI);

    let server = axum::Server::try_bind(&addr).map_err(server_error)?;

    tracing::info!("listening on {}", addr);

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(server_error)
}
