mod location;
mod notification;
mod ride;
mod sweep_report;

pub use location::{Coordinates, Location};
pub use notification::{Notification, NotificationKind};
pub use ride::{DeadlineAction, Ride, RideRequest, Status as RideStatus};
pub use sweep_report::SweepReport;
