//! Route & time engine.
//!
//! Per technician: build units from the assigned jobs, then pack them across
//! the planning horizon day by day. Each day places the fixed-time units,
//! greedily trial-fits dynamic units into the remaining gaps with the same
//! arrival-based check the ETA estimator uses, and hands the day to the
//! optimiser for the real sequencing. The optimiser's verdict wins; when it
//! is unreachable or errors out, only the fixed units are committed and the
//! trialed dynamics return to the queue. After the day loop every scheduled
//! job receives its ETA fields through the data interface.
//!
//! Technicians are planned independently; there is no shared mutable state
//! between them, and a failure in one technician's plan never affects
//! another's.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, SecondsFormat, Timelike, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use fieldline_optimiser::api::{
    FixedConstraintPayload, ItemPayload, LocationRef, OptimizationRequest, OptimizationStatus,
    TechnicianPayload, UnavailabilityPayload,
};

use crate::data::{retry_write, DataError, JobEtaUpdate, SchedulerData};
use crate::services::availability::AvailabilityProvider;
use crate::services::optimiser_client::Optimiser;
use crate::services::travel::TravelTimeProvider;
use crate::services::units::{build_schedulable_units, group_jobs_by_order};
use crate::types::{Address, DailyAvailability, SchedulableUnit, Technician};

pub struct RouteTimeEngine<'a> {
    pub data: &'a dyn SchedulerData,
    pub travel: &'a dyn TravelTimeProvider,
    pub availability: &'a dyn AvailabilityProvider,
    pub optimiser: &'a dyn Optimiser,
    pub max_planning_days: u32,
}

/// Per-technician planning summary for the cycle report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianPlanReport {
    pub technician_id: i64,
    pub days_planned: usize,
    pub scheduled_units: usize,
    pub unscheduled_unit_ids: Vec<String>,
    pub failed: bool,
}

impl TechnicianPlanReport {
    fn failed(technician_id: i64) -> Self {
        Self {
            technician_id,
            days_planned: 0,
            scheduled_units: 0,
            unscheduled_unit_ids: vec![],
            failed: true,
        }
    }
}

fn iso(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn floor_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("zeroing sub-hour fields is always valid")
}

fn ceil_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let floored = floor_to_hour(timestamp);
    if floored == timestamp {
        floored
    } else {
        floored + Duration::hours(1)
    }
}

impl<'a> RouteTimeEngine<'a> {
    /// Plan every technician independently. Per-technician failures are
    /// logged and reported, never propagated across technicians.
    pub async fn update_job_queues_and_routes(
        &self,
        technicians: &mut [Technician],
    ) -> Vec<TechnicianPlanReport> {
        futures::future::join_all(technicians.iter_mut().map(|technician| async move {
            let technician_id = technician.id;
            match self.plan_technician(technician).await {
                Ok(report) => report,
                Err(err) => {
                    error!(technician_id, %err, "planning failed, skipping technician");
                    TechnicianPlanReport::failed(technician_id)
                }
            }
        }))
        .await
    }

    pub async fn plan_technician(
        &self,
        technician: &mut Technician,
    ) -> Result<TechnicianPlanReport, DataError> {
        technician.schedule.clear();

        let jobs = self.data.fetch_assigned_jobs(technician.id).await?;
        let jobs: Vec<_> = jobs.into_iter().filter(|job| !job.fixed_assignment).collect();

        if jobs.is_empty() {
            // Keep persisted ETAs consistent with the (empty) schedule.
            let empty_etas = HashMap::new();
            retry_write("update_job_etas", || {
                self.data.update_job_etas(&empty_etas)
            })
            .await?;
            return Ok(TechnicianPlanReport {
                technician_id: technician.id,
                days_planned: 0,
                scheduled_units: 0,
                unscheduled_unit_ids: vec![],
                failed: false,
            });
        }

        let units = build_schedulable_units(group_jobs_by_order(&jobs));
        let (mut pending_fixed, mut remaining_dynamic): (Vec<_>, Vec<_>) = units
            .into_iter()
            .partition(|unit| unit.fixed_schedule_time.is_some());
        pending_fixed.sort_by_key(|unit| unit.fixed_schedule_time);
        sort_dynamic(&mut remaining_dynamic);

        let mut start_times: BTreeMap<u32, HashMap<String, DateTime<Utc>>> = BTreeMap::new();

        let mut day_number = 1;
        while day_number <= self.max_planning_days
            && (!pending_fixed.is_empty() || !remaining_dynamic.is_empty())
        {
            let Some(availability) = self
                .availability
                .daily_availability(technician, day_number)
            else {
                day_number += 1;
                continue;
            };
            if availability.total_duration <= Duration::zero() {
                day_number += 1;
                continue;
            }

            let start_location = technician.start_location_for_day(day_number).clone();

            let (placed_fixed, rejected) =
                place_fixed_units(technician.id, &mut pending_fixed, &availability);
            pending_fixed.extend(rejected);
            pending_fixed.sort_by_key(|unit| unit.fixed_schedule_time);

            let trialed = self.trial_fit_dynamics(
                &mut remaining_dynamic,
                &placed_fixed,
                &availability,
                &start_location,
            );

            let day_units: Vec<SchedulableUnit> =
                placed_fixed.iter().cloned().chain(trialed.iter().cloned()).collect();
            if day_units.is_empty() {
                day_number += 1;
                continue;
            }

            let request = self.build_request(
                technician,
                &availability,
                &start_location,
                &day_units,
                day_number,
            );

            match self.optimiser.optimize(&request).await {
                Ok(response) if response.status != OptimizationStatus::Error => {
                    let mut committed = Vec::new();
                    let mut times: HashMap<String, DateTime<Utc>> = HashMap::new();

                    let stops = response
                        .routes
                        .iter()
                        .find(|route| route.technician_id == technician.id)
                        .map(|route| route.stops.as_slice())
                        .unwrap_or_default();
                    for stop in stops {
                        let Some(unit) =
                            day_units.iter().find(|unit| unit.id == stop.item_id)
                        else {
                            warn!(item_id = %stop.item_id, "optimiser returned an unknown item");
                            continue;
                        };
                        match stop.start_time_iso.parse::<DateTime<Utc>>() {
                            Ok(start) => {
                                times.insert(unit.id.clone(), start);
                                committed.push(unit.clone());
                            }
                            Err(err) => {
                                warn!(item_id = %stop.item_id, %err, "unparseable stop time");
                            }
                        }
                    }

                    // Everything the optimiser did not place (reported
                    // unassigned, or dropped for any other reason) goes back
                    // to its queue and is retried on a later day.
                    for unit in &day_units {
                        if committed.iter().any(|placed| placed.id == unit.id) {
                            continue;
                        }
                        if unit.fixed_schedule_time.is_some() {
                            pending_fixed.push(unit.clone());
                        } else {
                            remaining_dynamic.push(unit.clone());
                        }
                    }
                    pending_fixed.sort_by_key(|unit| unit.fixed_schedule_time);
                    sort_dynamic(&mut remaining_dynamic);

                    if !committed.is_empty() {
                        start_times.insert(day_number, times);
                        technician.schedule.insert(day_number, committed);
                    }
                }
                outcome => {
                    match outcome {
                        Ok(response) => warn!(
                            technician_id = technician.id,
                            day_number,
                            message = %response.message,
                            "optimiser reported an error, committing fixed units only"
                        ),
                        Err(err) => warn!(
                            technician_id = technician.id,
                            day_number,
                            %err,
                            "optimiser unreachable, committing fixed units only"
                        ),
                    }

                    if !placed_fixed.is_empty() {
                        let times = placed_fixed
                            .iter()
                            .filter_map(|unit| {
                                unit.fixed_schedule_time
                                    .map(|fixed| (unit.id.clone(), fixed))
                            })
                            .collect();
                        start_times.insert(day_number, times);
                        technician.schedule.insert(day_number, placed_fixed.clone());
                    }
                    remaining_dynamic.extend(trialed);
                    sort_dynamic(&mut remaining_dynamic);
                }
            }

            day_number += 1;
        }

        let eta_updates = back_propagate(technician, &start_times);
        let written = retry_write("update_job_etas", || {
            self.data.update_job_etas(&eta_updates)
        })
        .await;
        if let Err(err) = written {
            warn!(technician_id = technician.id, %err, "ETA write failed, jobs unchanged");
        }

        let mut unscheduled_unit_ids = Vec::new();
        for unit in &pending_fixed {
            warn!(
                technician_id = technician.id,
                unit_id = %unit.id,
                "fixed unit could not be scheduled within the horizon"
            );
            unscheduled_unit_ids.push(unit.id.clone());
            // Surface the conflict instead of carrying a stale agreement.
            for job in &unit.jobs {
                let cleared = retry_write("update_job_fixed_schedule", || {
                    self.data.update_job_fixed_schedule(job.id, None)
                })
                .await;
                if let Err(err) = cleared {
                    warn!(job_id = job.id, %err, "failed to clear fixed schedule");
                }
            }
        }
        for unit in &remaining_dynamic {
            warn!(
                technician_id = technician.id,
                unit_id = %unit.id,
                "unit could not be scheduled within the horizon"
            );
            unscheduled_unit_ids.push(unit.id.clone());
        }

        let scheduled_units = technician.schedule.values().map(Vec::len).sum();
        info!(
            technician_id = technician.id,
            days = technician.schedule.len(),
            scheduled_units,
            unscheduled = unscheduled_unit_ids.len(),
            "technician planned"
        );

        Ok(TechnicianPlanReport {
            technician_id: technician.id,
            days_planned: technician.schedule.len(),
            scheduled_units,
            unscheduled_unit_ids,
            failed: false,
        })
    }

    /// Greedy gap fitting with the same arrival-based capacity check the ETA
    /// estimator applies: a unit fits a gap when travel from the preceding
    /// event plus its duration plus travel to the following event all fit.
    fn trial_fit_dynamics(
        &self,
        remaining_dynamic: &mut Vec<SchedulableUnit>,
        placed_fixed: &[SchedulableUnit],
        availability: &DailyAvailability,
        start_location: &Address,
    ) -> Vec<SchedulableUnit> {
        // (start, end, location after the event; None marks end-of-day)
        let mut events: Vec<(DateTime<Utc>, DateTime<Utc>, Option<Address>)> = Vec::new();
        events.push((
            availability.start_time,
            availability.start_time,
            Some(start_location.clone()),
        ));
        for unit in placed_fixed {
            let fixed = unit.fixed_schedule_time.expect("placed units are fixed");
            events.push((fixed, fixed + unit.duration, Some(unit.location.clone())));
        }
        events.push((availability.end_time, availability.end_time, None));
        events.sort_by_key(|event| event.0);

        let mut trialed = Vec::new();
        let mut trialed_ids = Vec::new();

        for unit in remaining_dynamic.iter() {
            let mut best: Option<(DateTime<Utc>, usize)> = None;

            for gap in 0..events.len() - 1 {
                let (_, before_end, before_location) = &events[gap];
                let (after_start, _, after_location) = &events[gap + 1];
                let Some(before_location) = before_location else {
                    continue;
                };

                let Some(travel_in) =
                    self.travel.travel_seconds(before_location, &unit.location)
                else {
                    continue;
                };
                let mut earliest = *before_end + Duration::seconds(travel_in);
                if let Some(bound) = unit.earliest_start_time {
                    earliest = earliest.max(bound);
                }

                let latest_end = match after_location {
                    Some(after_location) => {
                        let Some(travel_out) =
                            self.travel.travel_seconds(&unit.location, after_location)
                        else {
                            continue;
                        };
                        *after_start - Duration::seconds(travel_out)
                    }
                    None => *after_start,
                };

                if earliest >= *before_end && earliest + unit.duration <= latest_end {
                    match best {
                        Some((current, _)) if current <= earliest => {}
                        _ => best = Some((earliest, gap)),
                    }
                }
            }

            if let Some((start, gap)) = best {
                events.insert(
                    gap + 1,
                    (start, start + unit.duration, Some(unit.location.clone())),
                );
                events.sort_by_key(|event| event.0);
                trialed_ids.push(unit.id.clone());
                trialed.push(unit.clone());
            }
        }

        remaining_dynamic.retain(|unit| !trialed_ids.contains(&unit.id));
        trialed
    }

    /// Assemble the wire request for one technician-day: dense location
    /// indices over the used addresses, the technician as the single
    /// vehicle, fixed-time items as hard constraints, and the day's
    /// unavailabilities as break intervals. Infeasible travel pairs are
    /// simply omitted from the matrix.
    fn build_request(
        &self,
        technician: &Technician,
        availability: &DailyAvailability,
        start_location: &Address,
        units: &[SchedulableUnit],
        day_number: u32,
    ) -> OptimizationRequest {
        fn index_of(address: &Address, addresses: &mut Vec<Address>) -> usize {
            if let Some(position) = addresses.iter().position(|known| known == address) {
                position
            } else {
                addresses.push(address.clone());
                addresses.len() - 1
            }
        }

        let mut addresses: Vec<Address> = Vec::new();

        let start_index = index_of(start_location, &mut addresses);
        let end_index = index_of(&technician.home_location, &mut addresses);

        let mut items = Vec::with_capacity(units.len());
        let mut fixed_constraints = Vec::new();
        for unit in units {
            let location_index = index_of(&unit.location, &mut addresses);
            if let Some(fixed) = unit.fixed_schedule_time {
                fixed_constraints.push(FixedConstraintPayload {
                    item_id: unit.id.clone(),
                    fixed_time_iso: iso(&fixed),
                });
            }
            items.push(ItemPayload {
                id: unit.id.clone(),
                location_index,
                duration_seconds: unit.duration.num_seconds(),
                priority: unit.priority,
                eligible_technician_ids: vec![technician.id],
                earliest_start_time_iso: unit.earliest_start_time.as_ref().map(iso),
                is_fixed_time: unit.fixed_schedule_time.is_some(),
                fixed_time_iso: unit.fixed_schedule_time.as_ref().map(iso),
            });
        }

        let mut travel_time_matrix: HashMap<usize, HashMap<usize, i64>> = HashMap::new();
        for (from_index, from) in addresses.iter().enumerate() {
            let mut row = HashMap::new();
            for (to_index, to) in addresses.iter().enumerate() {
                if let Some(seconds) = self.travel.travel_seconds(from, to) {
                    row.insert(to_index, seconds);
                }
            }
            travel_time_matrix.insert(from_index, row);
        }

        let technician_unavailabilities = self
            .availability
            .unavailabilities(technician, day_number)
            .iter()
            .map(|interval| UnavailabilityPayload {
                technician_id: interval.technician_id,
                start_time_iso: iso(&interval.start_time),
                duration_seconds: interval.duration_seconds,
            })
            .collect();

        OptimizationRequest {
            locations: (0..addresses.len())
                .map(|index| LocationRef { index })
                .collect(),
            technicians: vec![TechnicianPayload {
                id: technician.id,
                start_location_index: start_index,
                end_location_index: end_index,
                earliest_start_time_iso: iso(&availability.start_time),
                latest_end_time_iso: iso(&availability.end_time),
            }],
            items,
            fixed_constraints,
            technician_unavailabilities,
            travel_time_matrix,
        }
    }
}

/// Priority first, longer units earlier on ties, id as the final tiebreak.
fn sort_dynamic(units: &mut [SchedulableUnit]) {
    units.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.duration.cmp(&a.duration))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Take the fixed units whose date matches the day and validate them against
/// the window and each other. Returns (placed, rejected); rejected units go
/// back to the pending queue.
fn place_fixed_units(
    technician_id: i64,
    pending_fixed: &mut Vec<SchedulableUnit>,
    availability: &DailyAvailability,
) -> (Vec<SchedulableUnit>, Vec<SchedulableUnit>) {
    let day_date = availability.start_time.date_naive();
    let mut todays = Vec::new();
    let mut keep = Vec::new();
    for unit in pending_fixed.drain(..) {
        let matches_day = unit
            .fixed_schedule_time
            .map(|fixed| fixed.date_naive() == day_date)
            .unwrap_or(false);
        if matches_day {
            todays.push(unit);
        } else {
            keep.push(unit);
        }
    }
    *pending_fixed = keep;
    todays.sort_by_key(|unit| unit.fixed_schedule_time);

    let mut placed = Vec::new();
    let mut rejected = Vec::new();
    let mut last_end = availability.start_time;
    for unit in todays {
        let fixed = unit.fixed_schedule_time.expect("fixed queue invariant");
        let fixed_end = fixed + unit.duration;
        if fixed >= last_end && fixed_end <= availability.end_time {
            last_end = fixed_end;
            placed.push(unit);
        } else {
            warn!(
                technician_id,
                unit_id = %unit.id,
                "fixed unit falls outside the window or overlaps an earlier fixed unit"
            );
            rejected.push(unit);
        }
    }

    (placed, rejected)
}

/// Write start/end times onto every job of every scheduled unit: jobs inside
/// a unit run back to back from the unit's start, and the customer window is
/// the job interval rounded outward to whole hours.
fn back_propagate(
    technician: &Technician,
    start_times: &BTreeMap<u32, HashMap<String, DateTime<Utc>>>,
) -> HashMap<i64, JobEtaUpdate> {
    let mut updates = HashMap::new();

    for (day_number, units) in &technician.schedule {
        let Some(times) = start_times.get(day_number) else {
            continue;
        };
        for unit in units {
            let Some(&unit_start) = times.get(&unit.id) else {
                warn!(unit_id = %unit.id, "scheduled unit has no start time, skipping ETAs");
                continue;
            };
            let mut job_start = unit_start;
            for job in &unit.jobs {
                let job_end = job_start + job.duration();
                updates.insert(
                    job.id,
                    JobEtaUpdate {
                        estimated_sched: job_start,
                        estimated_sched_end: job_end,
                        customer_eta_start: floor_to_hour(job_start),
                        customer_eta_end: ceil_to_hour(job_end),
                    },
                );
                job_start = job_end;
            }
        }
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryData;
    use crate::services::availability::WorkdayCalendar;
    use crate::services::fallback::FallbackOptimiser;
    use crate::services::travel::MatrixTravelProvider;
    use crate::types::{
        Coordinates, Job, JobStatus, PlanningSnapshot, TravelTimeEntry,
    };
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use fieldline_optimiser::api::{OptimizationRequest, OptimizationResponse};
    use std::collections::{BTreeMap, BTreeSet};

    fn address(id: i64) -> Address {
        Address {
            id,
            street_address: String::new(),
            coordinates: Coordinates { lat: 50.0, lng: 14.0 },
        }
    }

    fn technician(id: i64) -> Technician {
        Technician {
            id,
            home_location: address(1),
            current_location: address(1),
            equipment: BTreeSet::new(),
            schedule: BTreeMap::new(),
        }
    }

    fn assigned_job(id: i64, order_id: i64, location_id: i64, duration_hours: i64) -> Job {
        Job {
            id,
            order_id,
            location: address(location_id),
            priority: 2,
            duration_seconds: duration_hours * 3600,
            required_equipment: BTreeSet::new(),
            fixed_schedule_time: None,
            earliest_start_time: None,
            fixed_assignment: false,
            assigned_technician_id: Some(1),
            status: JobStatus::Assigned,
            estimated_sched: None,
            estimated_sched_end: None,
            customer_eta_start: None,
            customer_eta_end: None,
            ymm_id: None,
            service_ids: vec![],
        }
    }

    fn travel() -> MatrixTravelProvider {
        let mut entries = Vec::new();
        for from in 1..=9i64 {
            for to in 1..=9i64 {
                entries.push(TravelTimeEntry {
                    from_address_id: from,
                    to_address_id: to,
                    seconds: if from == to { 0 } else { 600 },
                });
            }
        }
        MatrixTravelProvider::from_entries(&entries)
    }

    fn calendar_until(end_hour: u32) -> WorkdayCalendar {
        WorkdayCalendar::new(
            NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(), // Monday
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap(),
            vec![],
        )
    }

    fn store(jobs: Vec<Job>) -> InMemoryData {
        InMemoryData::from_snapshot(&PlanningSnapshot {
            planning_day: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
            technicians: vec![],
            jobs,
            workday_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            workday_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            unavailabilities: vec![],
            travel_times: vec![],
            equipment_requirements: vec![],
        })
    }

    /// Always-failing optimiser for the fixed-units-only path.
    struct BrokenOptimiser;

    #[async_trait]
    impl Optimiser for BrokenOptimiser {
        async fn optimize(
            &self,
            request: &OptimizationRequest,
        ) -> Result<OptimizationResponse, crate::services::optimiser_client::OptimiserError> {
            Ok(OptimizationResponse::error_all_unassigned(
                "solver exploded",
                &request.items,
            ))
        }
    }

    #[tokio::test]
    async fn three_long_jobs_spill_over_three_days() {
        let jobs = vec![
            assigned_job(1, 10, 2, 6),
            assigned_job(2, 20, 3, 6),
            assigned_job(3, 30, 4, 6),
        ];
        let data = store(jobs);
        let travel = travel();
        let calendar = calendar_until(16); // 8h days
        let fallback = FallbackOptimiser::default();
        let engine = RouteTimeEngine {
            data: &data,
            travel: &travel,
            availability: &calendar,
            optimiser: &fallback,
            max_planning_days: 14,
        };

        let mut tech = technician(1);
        let report = engine.plan_technician(&mut tech).await.unwrap();

        assert_eq!(report.days_planned, 3);
        assert_eq!(report.scheduled_units, 3);
        assert!(report.unscheduled_unit_ids.is_empty());
        assert_eq!(
            tech.schedule.keys().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(tech.schedule.values().all(|units| units.len() == 1));

        // ETAs were written for every job, monotonically per day.
        for job_id in [1, 2, 3] {
            let job = data.job(job_id).unwrap();
            assert!(job.estimated_sched.is_some());
            assert!(job.estimated_sched_end.is_some());
            assert!(job.customer_eta_start.is_some());
        }
    }

    #[tokio::test]
    async fn fixed_unit_is_scheduled_at_its_exact_time() {
        let mut fixed = assigned_job(1, 10, 2, 2);
        fixed.fixed_schedule_time = Some("2026-08-03T10:00:00Z".parse().unwrap());
        let jobs = vec![fixed, assigned_job(2, 20, 3, 1)];
        let data = store(jobs);
        let travel = travel();
        let calendar = calendar_until(17);
        let fallback = FallbackOptimiser::default();
        let engine = RouteTimeEngine {
            data: &data,
            travel: &travel,
            availability: &calendar,
            optimiser: &fallback,
            max_planning_days: 14,
        };

        let mut tech = technician(1);
        engine.plan_technician(&mut tech).await.unwrap();

        let fixed_job = data.job(1).unwrap();
        assert_eq!(
            fixed_job.estimated_sched.unwrap().to_rfc3339(),
            "2026-08-03T10:00:00+00:00"
        );
        // The dynamic job was planned around it on the same day.
        assert!(data.job(2).unwrap().estimated_sched.is_some());
        assert_eq!(tech.schedule.len(), 1);
    }

    #[tokio::test]
    async fn solver_failure_commits_fixed_units_only() {
        let mut fixed = assigned_job(1, 10, 2, 2);
        fixed.fixed_schedule_time = Some("2026-08-03T10:00:00Z".parse().unwrap());
        let jobs = vec![fixed, assigned_job(2, 20, 3, 1)];
        let data = store(jobs);
        let travel = travel();
        let calendar = calendar_until(17);
        let engine = RouteTimeEngine {
            data: &data,
            travel: &travel,
            availability: &calendar,
            optimiser: &BrokenOptimiser,
            max_planning_days: 3,
        };

        let mut tech = technician(1);
        let report = engine.plan_technician(&mut tech).await.unwrap();

        // The fixed unit is committed at its agreed time.
        let fixed_job = data.job(1).unwrap();
        assert_eq!(
            fixed_job.estimated_sched.unwrap().to_rfc3339(),
            "2026-08-03T10:00:00+00:00"
        );
        // The dynamic unit never gets scheduled and is surfaced.
        assert!(data.job(2).unwrap().estimated_sched.is_none());
        assert!(report.unscheduled_unit_ids.contains(&"unit-20".to_string()));
    }

    #[tokio::test]
    async fn fixed_unit_outside_every_window_is_surfaced_and_cleared() {
        let mut fixed = assigned_job(1, 10, 2, 2);
        // Saturday: the calendar never opens a window for it.
        fixed.fixed_schedule_time = Some("2026-08-08T10:00:00Z".parse().unwrap());
        let data = store(vec![fixed]);
        let travel = travel();
        let calendar = calendar_until(17);
        let fallback = FallbackOptimiser::default();
        let engine = RouteTimeEngine {
            data: &data,
            travel: &travel,
            availability: &calendar,
            optimiser: &fallback,
            max_planning_days: 14,
        };

        let mut tech = technician(1);
        let report = engine.plan_technician(&mut tech).await.unwrap();

        assert_eq!(report.scheduled_units, 0);
        assert_eq!(report.unscheduled_unit_ids, vec!["unit-10"]);
        // The stale agreement was cleared through the data interface.
        assert!(data.job(1).unwrap().fixed_schedule_time.is_none());
    }

    #[tokio::test]
    async fn jobs_in_one_unit_get_sequential_etas() {
        let jobs = vec![
            assigned_job(1, 10, 2, 1),
            assigned_job(2, 10, 2, 2),
        ];
        let data = store(jobs);
        let travel = travel();
        let calendar = calendar_until(17);
        let fallback = FallbackOptimiser::default();
        let engine = RouteTimeEngine {
            data: &data,
            travel: &travel,
            availability: &calendar,
            optimiser: &fallback,
            max_planning_days: 14,
        };

        let mut tech = technician(1);
        engine.plan_technician(&mut tech).await.unwrap();

        let first = data.job(1).unwrap();
        let second = data.job(2).unwrap();
        // Zero gap between jobs of one unit.
        assert_eq!(first.estimated_sched_end, second.estimated_sched);
        // Customer windows are rounded outward to whole hours.
        let eta_start = first.customer_eta_start.unwrap();
        assert_eq!(eta_start.minute(), 0);
        assert!(eta_start <= first.estimated_sched.unwrap());
    }

    #[tokio::test]
    async fn technician_without_jobs_gets_an_empty_plan() {
        let data = store(vec![]);
        let travel = travel();
        let calendar = calendar_until(17);
        let fallback = FallbackOptimiser::default();
        let engine = RouteTimeEngine {
            data: &data,
            travel: &travel,
            availability: &calendar,
            optimiser: &fallback,
            max_planning_days: 14,
        };

        let mut tech = technician(1);
        let report = engine.plan_technician(&mut tech).await.unwrap();
        assert_eq!(report.scheduled_units, 0);
        assert!(!report.failed);
        assert!(tech.schedule.is_empty());
    }

    #[test]
    fn hour_rounding_behaves_at_boundaries() {
        let exact: DateTime<Utc> = "2026-08-03T10:00:00Z".parse().unwrap();
        assert_eq!(floor_to_hour(exact), exact);
        assert_eq!(ceil_to_hour(exact), exact);

        let between: DateTime<Utc> = "2026-08-03T10:20:00Z".parse().unwrap();
        assert_eq!(floor_to_hour(between).to_rfc3339(), "2026-08-03T10:00:00+00:00");
        assert_eq!(ceil_to_hour(between).to_rfc3339(), "2026-08-03T11:00:00+00:00");
    }
}
