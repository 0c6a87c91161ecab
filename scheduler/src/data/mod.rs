//! Data-access seam.
//!
//! The engine reads a job/technician snapshot and writes assignment and ETA
//! deltas through this narrow interface. Every write is idempotent; a
//! transient failure is retried a bounded number of times and then surfaced,
//! at which point the affected job is reported `unchanged` for the cycle.

pub mod memory;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::types::{Job, JobStatus, Technician};

/// How often a transient write is retried before giving up.
pub const WRITE_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum DataError {
    /// Worth retrying: connectivity, timeouts, transient backend trouble.
    #[error("transient data-access failure: {0}")]
    Transient(String),
    #[error("unknown {entity} {id}")]
    NotFound { entity: &'static str, id: i64 },
}

impl DataError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Transient(_))
    }
}

/// ETA fields written back onto one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEtaUpdate {
    pub estimated_sched: DateTime<Utc>,
    pub estimated_sched_end: DateTime<Utc>,
    pub customer_eta_start: DateTime<Utc>,
    pub customer_eta_end: DateTime<Utc>,
}

/// The capability set the engine is polymorphic over.
#[async_trait]
pub trait SchedulerData: Send + Sync {
    async fn fetch_active_technicians(&self) -> Result<Vec<Technician>, DataError>;

    /// Jobs eligible for assignment (`pending_review`, not fixed).
    async fn fetch_pending_jobs(&self) -> Result<Vec<Job>, DataError>;

    /// Jobs currently owned by one technician with status `assigned`.
    async fn fetch_assigned_jobs(&self, technician_id: i64) -> Result<Vec<Job>, DataError>;

    /// Required equipment models for a vehicle/service combination.
    async fn fetch_equipment_requirements(
        &self,
        ymm_id: i64,
        service_ids: &[i64],
    ) -> Result<BTreeSet<String>, DataError>;

    async fn update_job_assignment(
        &self,
        job_id: i64,
        technician_id: Option<i64>,
        status: JobStatus,
    ) -> Result<(), DataError>;

    /// Upsert ETAs for many jobs at once. An empty map clears nothing and
    /// must still succeed.
    async fn update_job_etas(
        &self,
        etas: &HashMap<i64, JobEtaUpdate>,
    ) -> Result<(), DataError>;

    /// Set or clear a job's fixed schedule time.
    async fn update_job_fixed_schedule(
        &self,
        job_id: i64,
        fixed: Option<DateTime<Utc>>,
    ) -> Result<(), DataError>;
}

/// Run an idempotent write, retrying transient failures a bounded number of
/// times.
pub async fn retry_write<F, Fut>(operation: &str, write: F) -> Result<(), DataError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), DataError>>,
{
    let mut last_error = None;
    for attempt in 0..=WRITE_RETRIES {
        match write().await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() && attempt < WRITE_RETRIES => {
                warn!(operation, attempt, %err, "transient write failure, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_error.expect("loop exits early unless a transient error was seen"))
}
