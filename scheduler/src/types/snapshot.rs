//! Planning snapshot consumed by the `plan` command.
//!
//! The engine reads one snapshot per cycle through the data-access seam; how
//! the snapshot is produced (database, export, fixture) is outside the
//! engine. Times are UTC; travel entries are directed and a missing pair is
//! infeasible.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{Job, Technician, TechnicianUnavailability};

/// A directed travel-time entry keyed by address ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelTimeEntry {
    pub from_address_id: i64,
    pub to_address_id: i64,
    pub seconds: i64,
}

/// Required equipment models for one (vehicle, service) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentRequirementEntry {
    pub ymm_id: i64,
    pub service_id: i64,
    pub equipment_models: BTreeSet<String>,
}

/// Full input for one planning cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningSnapshot {
    /// Calendar date of day 1 of the planning horizon.
    pub planning_day: NaiveDate,
    pub technicians: Vec<Technician>,
    pub jobs: Vec<Job>,
    /// Weekday working window applied to every technician (UTC).
    #[serde(default = "default_workday_start")]
    pub workday_start: NaiveTime,
    #[serde(default = "default_workday_end")]
    pub workday_end: NaiveTime,
    #[serde(default)]
    pub unavailabilities: Vec<TechnicianUnavailability>,
    /// Empty means "no matrix": the engine falls back to the haversine
    /// estimate.
    #[serde(default)]
    pub travel_times: Vec<TravelTimeEntry>,
    #[serde(default)]
    pub equipment_requirements: Vec<EquipmentRequirementEntry>,
}

fn default_workday_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).expect("valid time")
}

fn default_workday_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).expect("valid time")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_defaults_apply() {
        let json = r#"{
            "planningDay": "2026-08-03",
            "technicians": [],
            "jobs": []
        }"#;
        let snapshot: PlanningSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.workday_start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(snapshot.workday_end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert!(snapshot.travel_times.is_empty());
        assert!(snapshot.equipment_requirements.is_empty());
    }
}
