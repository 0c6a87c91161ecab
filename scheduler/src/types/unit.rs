//! Schedulable units: the indivisible scheduling atom.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use super::{Address, Job};

/// A contiguous group of jobs from one order, done at one location by one
/// technician. Jobs execute in listed order with zero gap between them.
#[derive(Debug, Clone)]
pub struct SchedulableUnit {
    /// Stable id derived from the order, so repeated planning cycles over
    /// identical input produce identical units.
    pub id: String,
    pub order_id: i64,
    /// Never empty.
    pub jobs: Vec<Job>,
    /// `min` over the jobs (lower number = higher priority).
    pub priority: i32,
    /// Sum of job durations.
    pub duration: Duration,
    pub location: Address,
    /// Union of the jobs' requirements.
    pub required_equipment: BTreeSet<String>,
    /// Earliest fixed time of any fixed job in the unit.
    pub fixed_schedule_time: Option<DateTime<Utc>>,
    pub earliest_start_time: Option<DateTime<Utc>>,
    pub fixed_assignment: bool,
    pub assigned_technician_id: Option<i64>,
}

impl SchedulableUnit {
    pub fn stable_id(order_id: i64) -> String {
        format!("unit-{order_id}")
    }
}
