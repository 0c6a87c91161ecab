//! Wire format for the optimisation service.
//!
//! These types are shared with the scheduling engine, which depends on this
//! crate as a library. All times on the wire are ISO-8601 with an explicit
//! offset or trailing `Z`; all durations are integer seconds; all location
//! references are dense non-negative indices into `locations`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Prohibitive arc cost: an arc carrying this cost must never be used.
/// Protocol-level constant, kept in sync with the engine's capacity math.
pub const INFEASIBLE_COST: u64 = 9_999_999;

/// Base penalty for leaving an item unserved. The effective penalty scales
/// with item priority: `base × (max_priority − priority + 1)`.
pub const BASE_PENALTY: u64 = 100_000;

/// A location referenced by items and technician depots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRef {
    /// Dense non-negative index into the travel time matrix.
    pub index: usize,
}

/// One vehicle in the problem: a technician with a working window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianPayload {
    pub id: i64,
    pub start_location_index: usize,
    pub end_location_index: usize,
    /// Start of the working window (absolute ISO-8601).
    #[serde(rename = "earliestStartTimeISO")]
    pub earliest_start_time_iso: String,
    /// End of the working window (absolute ISO-8601).
    #[serde(rename = "latestEndTimeISO")]
    pub latest_end_time_iso: String,
}

/// One schedulable item (a unit of work at a single location).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub id: String,
    pub location_index: usize,
    pub duration_seconds: i64,
    /// Lower number = higher priority.
    pub priority: i32,
    pub eligible_technician_ids: Vec<i64>,
    /// Soft lower bound on the start time.
    #[serde(rename = "earliestStartTimeISO", default)]
    pub earliest_start_time_iso: Option<String>,
    /// Marks the item as fixed-time; `fixed_time_iso` must then be set.
    #[serde(default)]
    pub is_fixed_time: bool,
    #[serde(rename = "fixedTimeISO", default)]
    pub fixed_time_iso: Option<String>,
}

/// Alternate path for fixed times, keyed by item id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedConstraintPayload {
    pub item_id: String,
    #[serde(rename = "fixedTimeISO")]
    pub fixed_time_iso: String,
}

/// A hard break interval with fixed start and duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailabilityPayload {
    pub technician_id: i64,
    #[serde(rename = "startTimeISO")]
    pub start_time_iso: String,
    pub duration_seconds: i64,
}

/// Full optimisation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    pub locations: Vec<LocationRef>,
    pub technicians: Vec<TechnicianPayload>,
    pub items: Vec<ItemPayload>,
    #[serde(default)]
    pub fixed_constraints: Vec<FixedConstraintPayload>,
    #[serde(default)]
    pub technician_unavailabilities: Vec<UnavailabilityPayload>,
    /// `{fromIndex → {toIndex → seconds}}`. A missing or negative entry means
    /// the arc is infeasible. Symmetry is not required.
    pub travel_time_matrix: HashMap<usize, HashMap<usize, i64>>,
}

/// One visit in a produced route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStopPayload {
    pub item_id: String,
    /// Physical arrival: departure from the previous stop plus travel.
    #[serde(rename = "arrivalTimeISO")]
    pub arrival_time_iso: String,
    /// Scheduled service start (respects fixed times and waiting).
    #[serde(rename = "startTimeISO")]
    pub start_time_iso: String,
    #[serde(rename = "endTimeISO")]
    pub end_time_iso: String,
}

/// Ordered route for one technician.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianRoutePayload {
    pub technician_id: i64,
    pub stops: Vec<RouteStopPayload>,
    pub total_travel_time_seconds: u64,
    /// End of the last stop minus arrival at the first stop, in seconds.
    pub total_duration_seconds: i64,
}

/// Overall outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStatus {
    /// Every item was scheduled.
    Success,
    /// Some, but not all, items were scheduled.
    Partial,
    /// No item could be scheduled, or the solver failed entirely.
    Error,
}

/// Full optimisation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResponse {
    pub status: OptimizationStatus,
    pub message: String,
    pub routes: Vec<TechnicianRoutePayload>,
    pub unassigned_item_ids: Vec<String>,
}

impl OptimizationResponse {
    /// Error response reporting every input item as unassigned.
    pub fn error_all_unassigned(message: impl Into<String>, items: &[ItemPayload]) -> Self {
        Self {
            status: OptimizationStatus::Error,
            message: message.into(),
            routes: vec![],
            unassigned_item_ids: items.iter().map(|item| item.id.clone()).collect(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
