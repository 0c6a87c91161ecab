#![allow(dead_code)]
//! In-memory data store.
//!
//! Backs the `plan` command (one snapshot per cycle) and the engine tests.
//! Writes follow the same idempotent-upsert semantics the interface demands
//! of any real backend.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Job, JobStatus, PlanningSnapshot, Technician};

use super::{DataError, JobEtaUpdate, SchedulerData};

pub struct InMemoryData {
    technicians: Vec<Technician>,
    jobs: Mutex<HashMap<i64, Job>>,
    /// (ymm_id, service_id) → required models.
    equipment_requirements: HashMap<(i64, i64), BTreeSet<String>>,
}

impl InMemoryData {
    pub fn from_snapshot(snapshot: &PlanningSnapshot) -> Self {
        let jobs = snapshot
            .jobs
            .iter()
            .map(|job| (job.id, job.clone()))
            .collect();
        let equipment_requirements = snapshot
            .equipment_requirements
            .iter()
            .map(|entry| {
                (
                    (entry.ymm_id, entry.service_id),
                    entry.equipment_models.clone(),
                )
            })
            .collect();
        Self {
            technicians: snapshot.technicians.clone(),
            jobs: Mutex::new(jobs),
            equipment_requirements,
        }
    }

    /// Current state of one job, for tests and the cycle report.
    pub fn job(&self, job_id: i64) -> Option<Job> {
        self.jobs.lock().expect("job store poisoned").get(&job_id).cloned()
    }

    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .expect("job store poisoned")
            .values()
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }
}

#[async_trait]
impl SchedulerData for InMemoryData {
    async fn fetch_active_technicians(&self) -> Result<Vec<Technician>, DataError> {
        Ok(self.technicians.clone())
    }

    async fn fetch_pending_jobs(&self) -> Result<Vec<Job>, DataError> {
        let mut pending: Vec<Job> = self
            .jobs
            .lock()
            .expect("job store poisoned")
            .values()
            .filter(|job| job.status == JobStatus::PendingReview && !job.fixed_assignment)
            .cloned()
            .collect();
        pending.sort_by_key(|job| job.id);
        Ok(pending)
    }

    async fn fetch_assigned_jobs(&self, technician_id: i64) -> Result<Vec<Job>, DataError> {
        let mut assigned: Vec<Job> = self
            .jobs
            .lock()
            .expect("job store poisoned")
            .values()
            .filter(|job| {
                job.assigned_technician_id == Some(technician_id)
                    && job.status == JobStatus::Assigned
            })
            .cloned()
            .collect();
        assigned.sort_by_key(|job| job.id);
        Ok(assigned)
    }

    async fn fetch_equipment_requirements(
        &self,
        ymm_id: i64,
        service_ids: &[i64],
    ) -> Result<BTreeSet<String>, DataError> {
        let mut models = BTreeSet::new();
        for service_id in service_ids {
            if let Some(required) = self.equipment_requirements.get(&(ymm_id, *service_id)) {
                models.extend(required.iter().cloned());
            }
        }
        Ok(models)
    }

    async fn update_job_assignment(
        &self,
        job_id: i64,
        technician_id: Option<i64>,
        status: JobStatus,
    ) -> Result<(), DataError> {
        let mut jobs = self.jobs.lock().expect("job store poisoned");
        let job = jobs.get_mut(&job_id).ok_or(DataError::NotFound {
            entity: "job",
            id: job_id,
        })?;
        job.assigned_technician_id = technician_id;
        job.status = status;
        Ok(())
    }

    async fn update_job_etas(
        &self,
        etas: &HashMap<i64, JobEtaUpdate>,
    ) -> Result<(), DataError> {
        let mut jobs = self.jobs.lock().expect("job store poisoned");
        for (job_id, update) in etas {
            let job = jobs.get_mut(job_id).ok_or(DataError::NotFound {
                entity: "job",
                id: *job_id,
            })?;
            job.estimated_sched = Some(update.estimated_sched);
            job.estimated_sched_end = Some(update.estimated_sched_end);
            job.customer_eta_start = Some(update.customer_eta_start);
            job.customer_eta_end = Some(update.customer_eta_end);
        }
        Ok(())
    }

    async fn update_job_fixed_schedule(
        &self,
        job_id: i64,
        fixed: Option<DateTime<Utc>>,
    ) -> Result<(), DataError> {
        let mut jobs = self.jobs.lock().expect("job store poisoned");
        let job = jobs.get_mut(&job_id).ok_or(DataError::NotFound {
            entity: "job",
            id: job_id,
        })?;
        job.fixed_schedule_time = fixed;
        Ok(())
    }
}
