//! Assignment planner.
//!
//! Decides which technician should own each pending job. Multi-job orders
//! are kept together when a single fully-equipped technician can start the
//! whole order no later than the jobs could individually start; otherwise
//! every job competes on its own. Ties on equal ETA go to the lower
//! technician id, so repeated cycles over identical input assign
//! identically.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::data::{retry_write, DataError, SchedulerData};
use crate::services::eta::EtaEstimator;
use crate::services::units::group_jobs_by_order;
use crate::types::{Job, JobStatus, Technician};

/// Per-cycle outcome: every input job lands in exactly one bucket.
#[derive(Debug, Default)]
pub struct AssignmentOutcome {
    pub assigned: Vec<(i64, i64)>,
    /// Jobs with no eligible technician or no feasible ETA this cycle.
    pub unassigned: Vec<i64>,
    /// Jobs the engine may not touch (fixed or progressed past assignment).
    pub unchanged: Vec<i64>,
}

pub struct AssignmentPlanner<'a> {
    pub data: &'a dyn SchedulerData,
    pub eta: EtaEstimator<'a>,
}

impl<'a> AssignmentPlanner<'a> {
    pub async fn assign_jobs(
        &self,
        jobs: &[Job],
        technicians: &[Technician],
    ) -> Result<AssignmentOutcome, DataError> {
        let mut outcome = AssignmentOutcome::default();

        let mut dynamic = Vec::new();
        for job in jobs {
            if job.is_assignable() {
                dynamic.push(job.clone());
            } else {
                outcome.unchanged.push(job.id);
            }
        }

        for (order_id, order_jobs) in group_jobs_by_order(&dynamic) {
            let combined = if order_jobs.len() > 1 {
                self.best_technician_for(technicians, &order_jobs, |tech| {
                    tech.has_all_equipment(&order_jobs)
                })
            } else {
                None
            };

            // Per-job winners, computed regardless so the combined ETA has
            // something to beat.
            let individual: Vec<(i64, Option<(i64, DateTime<Utc>)>)> = order_jobs
                .iter()
                .map(|job| {
                    let winner = self.best_technician_for(
                        technicians,
                        std::slice::from_ref(job),
                        |tech| tech.has_equipment(&job.required_equipment),
                    );
                    (job.id, winner)
                })
                .collect();

            let keep_together = match &combined {
                Some((_, combined_eta)) => {
                    let individual_etas: Vec<DateTime<Utc>> = individual
                        .iter()
                        .filter_map(|(_, winner)| winner.map(|(_, eta)| eta))
                        .collect();
                    // If any job has no individual winner, splitting would
                    // strand it: keep the order together.
                    individual_etas.len() < order_jobs.len()
                        || individual_etas
                            .iter()
                            .max()
                            .map(|latest| combined_eta < latest)
                            .unwrap_or(true)
                }
                None => false,
            };

            if keep_together {
                let (technician_id, eta) = combined.expect("checked above");
                info!(order_id, technician_id, %eta, "assigning whole order");
                for job in &order_jobs {
                    self.write_assignment(job.id, technician_id, &mut outcome)
                        .await;
                }
            } else {
                for (job_id, winner) in individual {
                    match winner {
                        Some((technician_id, _)) => {
                            self.write_assignment(job_id, technician_id, &mut outcome)
                                .await;
                        }
                        None => {
                            warn!(job_id, order_id, "no feasible technician, job stays pending");
                            outcome.unassigned.push(job_id);
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Best (technician, ETA) among those passing `capable`, earliest ETA
    /// first, lower id on ties.
    fn best_technician_for<F>(
        &self,
        technicians: &[Technician],
        jobs: &[Job],
        capable: F,
    ) -> Option<(i64, DateTime<Utc>)>
    where
        F: Fn(&Technician) -> bool,
    {
        technicians
            .iter()
            .filter(|tech| capable(tech))
            .filter_map(|tech| {
                self.eta
                    .earliest_start(tech, jobs)
                    .map(|eta| (eta, tech.id))
            })
            .min()
            .map(|(eta, technician_id)| (technician_id, eta))
    }

    /// A failed write never aborts the cycle: the job is reported
    /// `unchanged` and planning moves on.
    async fn write_assignment(
        &self,
        job_id: i64,
        technician_id: i64,
        outcome: &mut AssignmentOutcome,
    ) {
        let written = retry_write("update_job_assignment", || {
            self.data
                .update_job_assignment(job_id, Some(technician_id), JobStatus::Assigned)
        })
        .await;

        match written {
            Ok(()) => outcome.assigned.push((job_id, technician_id)),
            Err(err) => {
                warn!(job_id, technician_id, %err, "assignment write failed, job unchanged");
                outcome.unchanged.push(job_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryData;
    use crate::services::availability::WorkdayCalendar;
    use crate::services::travel::MatrixTravelProvider;
    use crate::types::{
        Address, Coordinates, PlanningSnapshot, TravelTimeEntry,
    };
    use chrono::{NaiveDate, NaiveTime};
    use std::collections::{BTreeMap, BTreeSet};

    fn address(id: i64) -> Address {
        Address {
            id,
            street_address: String::new(),
            coordinates: Coordinates { lat: 50.0, lng: 14.0 },
        }
    }

    fn technician(id: i64, equipment: &[&str]) -> Technician {
        Technician {
            id,
            home_location: address(id),
            current_location: address(id),
            equipment: equipment.iter().map(|model| model.to_string()).collect(),
            schedule: BTreeMap::new(),
        }
    }

    fn job(id: i64, order_id: i64, required: &[&str]) -> Job {
        Job {
            id,
            order_id,
            location: address(100),
            priority: 1,
            duration_seconds: 3600,
            required_equipment: required.iter().map(|model| model.to_string()).collect(),
            fixed_schedule_time: None,
            earliest_start_time: None,
            fixed_assignment: false,
            assigned_technician_id: None,
            status: JobStatus::PendingReview,
            estimated_sched: None,
            estimated_sched_end: None,
            customer_eta_start: None,
            customer_eta_end: None,
            ymm_id: None,
            service_ids: vec![],
        }
    }

    /// Address 101 is far away (2h) from everything; every other pair is
    /// 10 minutes apart.
    fn travel() -> MatrixTravelProvider {
        let mut entries = Vec::new();
        for from in [1i64, 2, 100, 101] {
            for to in [1i64, 2, 100, 101] {
                let seconds = if from == to {
                    0
                } else if to == 101 || from == 101 {
                    7200
                } else {
                    600
                };
                entries.push(TravelTimeEntry {
                    from_address_id: from,
                    to_address_id: to,
                    seconds,
                });
            }
        }
        MatrixTravelProvider::from_entries(&entries)
    }

    fn calendar() -> WorkdayCalendar {
        WorkdayCalendar::new(
            NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
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

    #[tokio::test]
    async fn single_job_goes_to_the_only_capable_technician() {
        let jobs = vec![job(1, 10, &["PROG-X9"])];
        let data = store(jobs.clone());
        let travel = travel();
        let calendar = calendar();
        let planner = AssignmentPlanner {
            data: &data,
            eta: EtaEstimator {
                travel: &travel,
                availability: &calendar,
                max_planning_days: 14,
            },
        };
        let technicians = vec![technician(1, &[]), technician(2, &["PROG-X9"])];

        let outcome = planner.assign_jobs(&jobs, &technicians).await.unwrap();
        assert_eq!(outcome.assigned, vec![(1, 2)]);
        assert_eq!(data.job(1).unwrap().status, JobStatus::Assigned);
        assert_eq!(data.job(1).unwrap().assigned_technician_id, Some(2));
    }

    #[tokio::test]
    async fn equal_etas_break_toward_the_lower_technician_id() {
        let jobs = vec![job(1, 10, &[])];
        let data = store(jobs.clone());
        let travel = travel();
        let calendar = calendar();
        let planner = AssignmentPlanner {
            data: &data,
            eta: EtaEstimator {
                travel: &travel,
                availability: &calendar,
                max_planning_days: 14,
            },
        };
        let technicians = vec![technician(2, &[]), technician(1, &[])];

        let outcome = planner.assign_jobs(&jobs, &technicians).await.unwrap();
        assert_eq!(outcome.assigned, vec![(1, 1)]);
    }

    #[tokio::test]
    async fn order_stays_together_when_combined_start_beats_the_split() {
        // Job 2 sits at the distant address 101, so its individual ETA is
        // 2h out, while the order as a unit (at job 1's location) could
        // start at 08:10. Only tech 2 carries both required models.
        let mut far_job = job(2, 10, &["AUTEL-CSC0602/01"]);
        far_job.location = address(101);
        let jobs = vec![job(1, 10, &["PROG-X9"]), far_job];
        let data = store(jobs.clone());
        let travel = travel();
        let calendar = calendar();
        let planner = AssignmentPlanner {
            data: &data,
            eta: EtaEstimator {
                travel: &travel,
                availability: &calendar,
                max_planning_days: 14,
            },
        };
        let technicians = vec![
            technician(1, &["PROG-X9"]),
            technician(2, &["PROG-X9", "AUTEL-CSC0602/01"]),
        ];

        let outcome = planner.assign_jobs(&jobs, &technicians).await.unwrap();
        // A split would give job 1 to tech 1; keeping the order together
        // hands both to the fully equipped tech 2.
        assert_eq!(outcome.assigned.len(), 2);
        assert!(outcome.assigned.iter().all(|(_, tech)| *tech == 2));
    }

    #[tokio::test]
    async fn order_splits_when_individual_starts_are_no_later() {
        let jobs = vec![job(1, 10, &[]), job(2, 10, &[])];
        let data = store(jobs.clone());
        let travel = travel();
        let calendar = calendar();
        let planner = AssignmentPlanner {
            data: &data,
            eta: EtaEstimator {
                travel: &travel,
                availability: &calendar,
                max_planning_days: 14,
            },
        };
        let technicians = vec![technician(1, &[]), technician(2, &[])];

        let outcome = planner.assign_jobs(&jobs, &technicians).await.unwrap();
        // Combined ETA equals each individual ETA (same first window), so
        // the order is split, and both individual winners are technician 1.
        assert_eq!(outcome.assigned, vec![(1, 1), (2, 1)]);
    }

    #[tokio::test]
    async fn jobs_without_any_capable_technician_stay_pending() {
        let jobs = vec![job(1, 10, &["LIFT-4T"])];
        let data = store(jobs.clone());
        let travel = travel();
        let calendar = calendar();
        let planner = AssignmentPlanner {
            data: &data,
            eta: EtaEstimator {
                travel: &travel,
                availability: &calendar,
                max_planning_days: 14,
            },
        };
        let technicians = vec![technician(1, &[])];

        let outcome = planner.assign_jobs(&jobs, &technicians).await.unwrap();
        assert!(outcome.assigned.is_empty());
        assert_eq!(outcome.unassigned, vec![1]);
        assert_eq!(data.job(1).unwrap().status, JobStatus::PendingReview);
    }

    #[tokio::test]
    async fn fixed_and_progressed_jobs_are_reported_unchanged() {
        let mut fixed = job(1, 10, &[]);
        fixed.fixed_assignment = true;
        let mut started = job(2, 20, &[]);
        started.status = JobStatus::InProgress;
        let jobs = vec![fixed, started];
        let data = store(jobs.clone());
        let travel = travel();
        let calendar = calendar();
        let planner = AssignmentPlanner {
            data: &data,
            eta: EtaEstimator {
                travel: &travel,
                availability: &calendar,
                max_planning_days: 14,
            },
        };

        let outcome = planner
            .assign_jobs(&jobs, &[technician(1, &[])])
            .await
            .unwrap();
        assert!(outcome.assigned.is_empty());
        assert_eq!(outcome.unchanged, vec![1, 2]);
    }
}
