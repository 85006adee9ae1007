use serde::{Deserialize, Serialize};

/// Outcome of one pass of deadline enforcement over the non-terminal rides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub timed_out: Vec<i64>,
    pub flagged_late: Vec<i64>,
    /// Rides that reached a terminal status between the scan and their update.
    pub skipped: usize,
}

impl SweepReport {
    pub fn changed(&self) -> usize {
        self.timed_out.len() + self.flagged_late.len()
    }
}
