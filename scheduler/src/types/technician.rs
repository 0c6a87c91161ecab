//! Technicians and their multi-day schedules.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Address, Job, SchedulableUnit};

/// A mobile technician. `schedule` is engine-owned working state and never
/// crosses the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: i64,
    pub home_location: Address,
    /// Used as the route start only on day 1 of the horizon.
    pub current_location: Address,
    /// Equipment models carried on the van.
    #[serde(default)]
    pub equipment: BTreeSet<String>,
    /// day number → ordered units for that day.
    #[serde(skip)]
    pub schedule: BTreeMap<u32, Vec<SchedulableUnit>>,
}

impl Technician {
    /// Eligibility: the van carries a superset of the required models.
    pub fn has_equipment(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.equipment)
    }

    /// Can this technician handle every job of an order on one visit?
    pub fn has_all_equipment(&self, jobs: &[Job]) -> bool {
        jobs.iter()
            .all(|job| self.has_equipment(&job.required_equipment))
    }

    pub fn start_location_for_day(&self, day_number: u32) -> &Address {
        if day_number == 1 {
            &self.current_location
        } else {
            &self.home_location
        }
    }
}
