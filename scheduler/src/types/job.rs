//! Jobs and their lifecycle.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Address;

/// Job lifecycle. The engine only ever writes `Assigned`; everything past it
/// belongs to field execution and makes the job immutable to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    PendingReview,
    Assigned,
    Scheduled,
    EnRoute,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// True once the status has progressed beyond the engine's reach.
    pub fn locks_assignment(&self) -> bool {
        !matches!(self, JobStatus::PendingReview | JobStatus::Assigned)
    }
}

/// A single unit of work at one location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i64,
    pub order_id: i64,
    pub location: Address,
    /// Lower number = higher priority.
    pub priority: i32,
    pub duration_seconds: i64,
    #[serde(default)]
    pub required_equipment: BTreeSet<String>,
    /// Hard start time; the produced schedule must match it exactly.
    #[serde(default)]
    pub fixed_schedule_time: Option<DateTime<Utc>>,
    /// Soft lower bound inherited from the order.
    #[serde(default)]
    pub earliest_start_time: Option<DateTime<Utc>>,
    /// When true the engine treats the job as immovable.
    #[serde(default)]
    pub fixed_assignment: bool,
    #[serde(default)]
    pub assigned_technician_id: Option<i64>,
    pub status: JobStatus,
    #[serde(default)]
    pub estimated_sched: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_sched_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer_eta_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer_eta_end: Option<DateTime<Utc>>,
    /// Vehicle year/make/model reference used for equipment lookup.
    #[serde(default)]
    pub ymm_id: Option<i64>,
    #[serde(default)]
    pub service_ids: Vec<i64>,
}

impl Job {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }

    /// A job the planner may (re)assign in this cycle.
    pub fn is_assignable(&self) -> bool {
        !self.fixed_assignment && !self.status.locks_assignment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;

    fn job(status: JobStatus, fixed_assignment: bool) -> Job {
        Job {
            id: 1,
            order_id: 10,
            location: Address {
                id: 100,
                street_address: String::new(),
                coordinates: Coordinates { lat: 50.0, lng: 14.0 },
            },
            priority: 2,
            duration_seconds: 3600,
            required_equipment: BTreeSet::new(),
            fixed_schedule_time: None,
            earliest_start_time: None,
            fixed_assignment,
            assigned_technician_id: None,
            status,
            estimated_sched: None,
            estimated_sched_end: None,
            customer_eta_start: None,
            customer_eta_end: None,
            ymm_id: None,
            service_ids: vec![],
        }
    }

    #[test]
    fn statuses_past_assigned_lock_the_job() {
        assert!(!JobStatus::PendingReview.locks_assignment());
        assert!(!JobStatus::Assigned.locks_assignment());
        assert!(JobStatus::Scheduled.locks_assignment());
        assert!(JobStatus::InProgress.locks_assignment());
        assert!(JobStatus::Cancelled.locks_assignment());
    }

    #[test]
    fn fixed_assignment_blocks_replanning() {
        assert!(job(JobStatus::PendingReview, false).is_assignable());
        assert!(!job(JobStatus::PendingReview, true).is_assignable());
        assert!(!job(JobStatus::EnRoute, false).is_assignable());
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::PendingReview).unwrap(),
            "\"pending_review\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::EnRoute).unwrap(),
            "\"en_route\""
        );
    }
}
