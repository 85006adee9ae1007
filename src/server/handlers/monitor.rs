use axum::extract::{Extension, Json};

use crate::api::DeadlineAPI;
use crate::entities::SweepReport;
use crate::error::Error;
use crate::server::DynAPI;

pub async fn sweep(Extension(api): Extension<DynAPI>) -> Result<Json<SweepReport>, Error> {
    let report = api.enforce_deadlines().await?;

    Ok(report.into())
}

#[tokio::test]
async fn sweep_reports_timeouts() {
    use crate::api::RideAPI;
    use crate::engine::{test_engine, test_request};
    use std::sync::Arc;

    let (engine, clock) = test_engine();
    let api: DynAPI = Arc::new(engine);

    let ride = api.request_ride(test_request(1, 2)).await.unwrap();
    clock.advance(chrono::Duration::minutes(30));

    let Json(report) = sweep(Extension(api)).await.unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.timed_out, vec![ride.id]);
}
