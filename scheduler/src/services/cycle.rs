//! One full planning cycle: fetch, assign, route, back-propagate.
//!
//! A cycle always terminates and always emits an outcome for every input
//! job: `assigned`, `unassigned`, or `unchanged`.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data::{DataError, SchedulerData};
use crate::services::assignment::{AssignmentOutcome, AssignmentPlanner};
use crate::services::availability::AvailabilityProvider;
use crate::services::eta::EtaEstimator;
use crate::services::optimiser_client::Optimiser;
use crate::services::planner::{RouteTimeEngine, TechnicianPlanReport};
use crate::services::travel::TravelTimeProvider;
use crate::types::Job;

/// Machine-readable cycle summary, printed by the `plan` command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleOutcome {
    pub cycle_id: Uuid,
    pub assigned_jobs: usize,
    pub unassigned_job_ids: Vec<i64>,
    pub unchanged_job_ids: Vec<i64>,
    pub technicians: Vec<TechnicianPlanReport>,
}

pub struct PlanningCycle<'a> {
    pub data: &'a dyn SchedulerData,
    pub travel: &'a dyn TravelTimeProvider,
    pub availability: &'a dyn AvailabilityProvider,
    pub optimiser: &'a dyn Optimiser,
    pub max_planning_days: u32,
}

impl<'a> PlanningCycle<'a> {
    pub async fn run(&self) -> Result<CycleOutcome, DataError> {
        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, "starting planning cycle");

        let mut technicians = self.data.fetch_active_technicians().await?;
        let mut pending_jobs = self.data.fetch_pending_jobs().await?;
        info!(
            technicians = technicians.len(),
            pending_jobs = pending_jobs.len(),
            "planning inputs loaded"
        );

        self.fill_equipment_requirements(&mut pending_jobs).await;

        let assignment = AssignmentPlanner {
            data: self.data,
            eta: EtaEstimator {
                travel: self.travel,
                availability: self.availability,
                max_planning_days: self.max_planning_days,
            },
        };
        let AssignmentOutcome {
            assigned,
            unassigned,
            unchanged,
        } = assignment.assign_jobs(&pending_jobs, &technicians).await?;

        let engine = RouteTimeEngine {
            data: self.data,
            travel: self.travel,
            availability: self.availability,
            optimiser: self.optimiser,
            max_planning_days: self.max_planning_days,
        };
        let reports = engine.update_job_queues_and_routes(&mut technicians).await;

        info!(
            %cycle_id,
            assigned = assigned.len(),
            unassigned = unassigned.len(),
            "planning cycle finished"
        );

        Ok(CycleOutcome {
            cycle_id,
            assigned_jobs: assigned.len(),
            unassigned_job_ids: unassigned,
            unchanged_job_ids: unchanged,
            technicians: reports,
        })
    }

    /// Populate missing equipment requirements from the vehicle/service
    /// lookup. A lookup failure leaves the job's requirements as supplied.
    async fn fill_equipment_requirements(&self, jobs: &mut [Job]) {
        for job in jobs {
            if !job.required_equipment.is_empty() || job.service_ids.is_empty() {
                continue;
            }
            let Some(ymm_id) = job.ymm_id else {
                continue;
            };
            match self
                .data
                .fetch_equipment_requirements(ymm_id, &job.service_ids)
                .await
            {
                Ok(models) => job.required_equipment = models,
                Err(err) => {
                    warn!(job_id = job.id, %err, "equipment requirement lookup failed");
                }
            }
        }
    }
}
