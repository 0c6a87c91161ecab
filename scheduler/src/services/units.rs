//! Unit builder: groups a technician's jobs by order into schedulable units.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use tracing::warn;

use crate::types::{Job, SchedulableUnit};

pub fn group_jobs_by_order(jobs: &[Job]) -> BTreeMap<i64, Vec<Job>> {
    let mut grouped: BTreeMap<i64, Vec<Job>> = BTreeMap::new();
    for job in jobs {
        grouped.entry(job.order_id).or_default().push(job.clone());
    }
    grouped
}

/// Build one unit per order. All jobs of an order are expected to share a
/// location; a mismatch is logged and the first job's location wins. When
/// several jobs carry distinct fixed times, the earliest wins and the
/// conflict is logged.
pub fn build_schedulable_units(jobs_by_order: BTreeMap<i64, Vec<Job>>) -> Vec<SchedulableUnit> {
    let mut units = Vec::with_capacity(jobs_by_order.len());

    for (order_id, jobs) in jobs_by_order {
        let Some(first) = jobs.first() else {
            continue;
        };
        let location = first.location.clone();

        if jobs.iter().any(|job| job.location != location) {
            warn!(
                order_id,
                "jobs in one order have differing locations, using the first job's"
            );
        }

        let priority = jobs.iter().map(|job| job.priority).min().unwrap_or(0);
        let duration = jobs
            .iter()
            .fold(Duration::zero(), |acc, job| acc + job.duration());

        let required_equipment: BTreeSet<String> = jobs
            .iter()
            .flat_map(|job| job.required_equipment.iter().cloned())
            .collect();

        let fixed_times: BTreeSet<_> = jobs
            .iter()
            .filter_map(|job| job.fixed_schedule_time)
            .collect();
        if fixed_times.len() > 1 {
            warn!(
                order_id,
                count = fixed_times.len(),
                "multiple distinct fixed times in one order, using the earliest"
            );
        }
        let fixed_schedule_time = fixed_times.into_iter().next();

        let earliest_start_time = jobs.iter().filter_map(|job| job.earliest_start_time).max();

        let assigned: BTreeSet<i64> = jobs
            .iter()
            .filter_map(|job| job.assigned_technician_id)
            .collect();
        let assigned_technician_id = match assigned.len() {
            0 | 1 => assigned.into_iter().next(),
            _ => {
                warn!(
                    order_id,
                    "jobs in one order are assigned to different technicians, leaving unit unset"
                );
                None
            }
        };

        units.push(SchedulableUnit {
            id: SchedulableUnit::stable_id(order_id),
            order_id,
            priority,
            duration,
            location,
            required_equipment,
            fixed_schedule_time,
            earliest_start_time,
            fixed_assignment: jobs.iter().any(|job| job.fixed_assignment),
            assigned_technician_id,
            jobs,
        });
    }

    units
}
