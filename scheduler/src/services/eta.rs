//! ETA estimation.
//!
//! A fast admissibility check used by the assignment planner: simulate
//! dropping a candidate unit into a technician's existing multi-day schedule
//! and return the earliest feasible start, without re-solving anything. The
//! same window derivation is reused by the route engine's gap fitting, so the
//! planner's check and the packer agree by construction.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::services::availability::AvailabilityProvider;
use crate::services::travel::TravelTimeProvider;
use crate::types::{Address, DailyAvailability, Job, Technician};

/// A free interval in a technician's day, together with the location of the
/// event immediately preceding it.
#[derive(Debug, Clone)]
pub struct AvailableWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location_before: Address,
}

pub struct EtaEstimator<'a> {
    pub travel: &'a dyn TravelTimeProvider,
    pub availability: &'a dyn AvailabilityProvider,
    pub max_planning_days: u32,
}

impl<'a> EtaEstimator<'a> {
    /// Derive the free windows of one technician-day by walking the already
    /// scheduled fixed-time units in time order. A fixed unit that overlaps
    /// an earlier event or leaks outside the working window is logged and
    /// ignored for window calculation.
    pub fn available_windows(
        &self,
        technician: &Technician,
        day_number: u32,
        availability: &DailyAvailability,
    ) -> Vec<AvailableWindow> {
        let start_location = technician.start_location_for_day(day_number).clone();

        let mut fixed_units: Vec<_> = technician
            .schedule
            .get(&day_number)
            .map(|units| {
                units
                    .iter()
                    .filter(|unit| unit.fixed_schedule_time.is_some())
                    .collect()
            })
            .unwrap_or_default();
        fixed_units.sort_by_key(|unit| unit.fixed_schedule_time);

        let mut windows = Vec::new();
        let mut last_end = availability.start_time;
        let mut last_location = start_location;

        for unit in fixed_units {
            let fixed_start = unit.fixed_schedule_time.expect("filtered to fixed units");
            let fixed_end = fixed_start + unit.duration;

            if fixed_start >= last_end && fixed_end <= availability.end_time {
                if fixed_start > last_end {
                    windows.push(AvailableWindow {
                        start: last_end,
                        end: fixed_start,
                        location_before: last_location.clone(),
                    });
                }
                last_end = fixed_end;
                last_location = unit.location.clone();
            } else {
                warn!(
                    technician_id = technician.id,
                    day_number,
                    unit_id = %unit.id,
                    "fixed unit conflicts with the day's timeline, ignoring for window calculation"
                );
            }
        }

        if last_end < availability.end_time {
            windows.push(AvailableWindow {
                start: last_end,
                end: availability.end_time,
                location_before: last_location,
            });
        }

        windows
    }

    /// Earliest feasible start for `jobs` treated as one unit, or `None`
    /// when no day in the horizon can take it.
    pub fn earliest_start(
        &self,
        technician: &Technician,
        jobs: &[Job],
    ) -> Option<DateTime<Utc>> {
        let Some(first) = jobs.first() else {
            warn!("ETA requested for an empty job list");
            return None;
        };
        let location = &first.location;

        let duration = jobs
            .iter()
            .fold(Duration::zero(), |acc, job| acc + job.duration());
        if duration <= Duration::zero() {
            warn!(job_id = first.id, "unit duration is not positive, no ETA");
            return None;
        }

        let earliest_bound = jobs.iter().filter_map(|job| job.earliest_start_time).max();

        // A unit longer than the largest single-day capacity can never fit.
        let largest_day = (1..=self.max_planning_days)
            .filter_map(|day| self.availability.daily_availability(technician, day))
            .map(|availability| availability.total_duration)
            .max();
        match largest_day {
            Some(capacity) if duration <= capacity => {}
            _ => return None,
        }

        for day_number in 1..=self.max_planning_days {
            let Some(availability) = self
                .availability
                .daily_availability(technician, day_number)
            else {
                continue;
            };
            if availability.total_duration <= Duration::zero() {
                continue;
            }

            for window in self.available_windows(technician, day_number, &availability) {
                let Some(travel) = self
                    .travel
                    .travel_seconds(&window.location_before, location)
                else {
                    continue;
                };
                let arrival = window.start + Duration::seconds(travel);
                let mut candidate = window.start.max(arrival);
                if let Some(bound) = earliest_bound {
                    candidate = candidate.max(bound);
                }
                if candidate + duration <= window.end {
                    return Some(candidate);
                }
            }
        }

        None
    }
}
