//! Working windows and unavailabilities.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One day's working window for a technician.
#[derive(Debug, Clone)]
pub struct DailyAvailability {
    pub day_number: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Window length minus any unavailability time inside it.
    pub total_duration: Duration,
}

/// A hard break with fixed start and duration, inside a day's window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianUnavailability {
    pub technician_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl TechnicianUnavailability {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::seconds(self.duration_seconds)
    }
}
