//! Internal planning model.
//!
//! Converts a wire request into relative-time form: a planning epoch is taken
//! as the earliest technician start, and every absolute timestamp becomes
//! seconds since that epoch, clamped to be non-negative. Eligibility is
//! expressed as an arc cost (travel plus a prohibitive sentinel when the
//! destination item is not serviceable by the vehicle's technician), so an
//! ineligible visit is always dominated by dropping the item.

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;
use tracing::warn;

use crate::api::{OptimizationRequest, BASE_PENALTY, INFEASIBLE_COST};
use crate::clock::{parse_timestamp, TimestampError};

const HOUR_SECONDS: i64 = 3_600;

/// Request-level validation failure. Maps to an HTTP 400.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no technicians provided")]
    NoTechnicians,
    #[error("technician {technician_id} has an invalid working window: {source}")]
    TechnicianWindow {
        technician_id: i64,
        source: TimestampError,
    },
    #[error("technician {technician_id} references unknown location index {index}")]
    UnknownDepot { technician_id: i64, index: usize },
    #[error("item {item_id} references unknown location index {index}")]
    UnknownLocation { item_id: String, index: usize },
    #[error("item {item_id} has a negative duration ({seconds}s)")]
    NegativeDuration { item_id: String, seconds: i64 },
    #[error("unavailability for technician {technician_id} has an invalid start time: {source}")]
    UnavailabilityStart {
        technician_id: i64,
        source: TimestampError,
    },
    #[error("unavailability for technician {technician_id} has a negative duration ({seconds}s)")]
    NegativeUnavailability { technician_id: i64, seconds: i64 },
}

/// A mandatory break: fixed start, fixed duration, no service and no travel
/// may overlap it.
#[derive(Debug, Clone, Copy)]
pub struct BreakInterval {
    /// Relative seconds since the planning epoch.
    pub start: i64,
    pub duration: i64,
}

impl BreakInterval {
    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}

/// One vehicle: a technician with depots, a working window, and breaks.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub technician_id: i64,
    pub start_location: usize,
    pub end_location: usize,
    /// Relative working window; both the first departure and the final
    /// return to the end depot must fall inside it.
    pub window_start: i64,
    pub window_end: i64,
    /// Sorted by start, non-overlapping in practice.
    pub breaks: Vec<BreakInterval>,
}

/// One item node in relative-time form.
#[derive(Debug, Clone)]
pub struct ItemNode {
    pub id: String,
    pub location: usize,
    pub service: i64,
    pub priority: i32,
    pub eligible: BTreeSet<i64>,
    /// Soft lower bound on the service start; 0 when absent.
    pub earliest_start: i64,
    /// Hard start time; the produced start must equal it exactly.
    pub fixed_start: Option<i64>,
    /// Cost of leaving this item unserved. `None` means the model cannot
    /// serve the item at all (no eligible vehicle, or the item sits on a
    /// depot location): it carries no penalty and is reported unassigned.
    pub drop_penalty: Option<u64>,
}

/// Travel time lookup. Missing and negative entries are prohibitive.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    entries: HashMap<usize, HashMap<usize, i64>>,
}

impl TravelMatrix {
    pub fn new(entries: HashMap<usize, HashMap<usize, i64>>) -> Self {
        Self { entries }
    }

    /// Travel cost in seconds, or `INFEASIBLE_COST` for a missing or
    /// negative entry.
    pub fn cost(&self, from: usize, to: usize) -> u64 {
        match self.entries.get(&from).and_then(|row| row.get(&to)) {
            Some(&seconds) if seconds >= 0 => seconds as u64,
            Some(&seconds) => {
                warn!(from, to, seconds, "negative travel time treated as infeasible");
                INFEASIBLE_COST
            }
            None => INFEASIBLE_COST,
        }
    }
}

/// The fully validated, relative-time problem.
#[derive(Debug)]
pub struct PlanningModel {
    /// Absolute Unix seconds of the earliest technician start.
    pub epoch: i64,
    /// Size of the dense location index space.
    pub num_locations: usize,
    pub vehicles: Vec<Vehicle>,
    pub items: Vec<ItemNode>,
    pub matrix: TravelMatrix,
    /// Upper bound on any relative time: `max(latest window end + 12h, 24h)`.
    pub horizon: i64,
}

impl PlanningModel {
    /// Validate a wire request and collapse it into relative time.
    pub fn from_request(request: &OptimizationRequest) -> Result<Self, InputError> {
        let num_locations = request.locations.len();

        // Planning epoch: earliest technician start across the request.
        let mut epoch: Option<i64> = None;
        for tech in &request.technicians {
            let start = parse_timestamp(&tech.earliest_start_time_iso).map_err(|source| {
                InputError::TechnicianWindow {
                    technician_id: tech.id,
                    source,
                }
            })?;
            epoch = Some(epoch.map_or(start, |current| current.min(start)));
        }
        let epoch = epoch.ok_or(InputError::NoTechnicians)?;

        let relative = |absolute: i64| (absolute - epoch).max(0);

        let mut vehicles = Vec::with_capacity(request.technicians.len());
        for tech in &request.technicians {
            for index in [tech.start_location_index, tech.end_location_index] {
                if index >= num_locations {
                    return Err(InputError::UnknownDepot {
                        technician_id: tech.id,
                        index,
                    });
                }
            }
            let start = parse_timestamp(&tech.earliest_start_time_iso).map_err(|source| {
                InputError::TechnicianWindow {
                    technician_id: tech.id,
                    source,
                }
            })?;
            let end = parse_timestamp(&tech.latest_end_time_iso).map_err(|source| {
                InputError::TechnicianWindow {
                    technician_id: tech.id,
                    source,
                }
            })?;

            let window_start = relative(start);
            let mut window_end = relative(end);
            if window_start > window_end {
                warn!(
                    technician_id = tech.id,
                    window_start, window_end, "technician window inverted, clamping end to start"
                );
                window_end = window_start;
            }

            vehicles.push(Vehicle {
                technician_id: tech.id,
                start_location: tech.start_location_index,
                end_location: tech.end_location_index,
                window_start,
                window_end,
                breaks: vec![],
            });
        }

        for unavailability in &request.technician_unavailabilities {
            if unavailability.duration_seconds < 0 {
                return Err(InputError::NegativeUnavailability {
                    technician_id: unavailability.technician_id,
                    seconds: unavailability.duration_seconds,
                });
            }
            let start = parse_timestamp(&unavailability.start_time_iso).map_err(|source| {
                InputError::UnavailabilityStart {
                    technician_id: unavailability.technician_id,
                    source,
                }
            })?;
            match vehicles
                .iter_mut()
                .find(|vehicle| vehicle.technician_id == unavailability.technician_id)
            {
                Some(vehicle) => vehicle.breaks.push(BreakInterval {
                    start: relative(start),
                    duration: unavailability.duration_seconds,
                }),
                None => warn!(
                    technician_id = unavailability.technician_id,
                    "unavailability references a technician not in the request, skipping"
                ),
            }
        }
        for vehicle in &mut vehicles {
            vehicle.breaks.sort_by_key(|interval| interval.start);
        }

        // Depot locations never receive a disjunction: an item placed there
        // coincides with a route endpoint and cannot be modelled as a visit.
        let depot_locations: HashSet<usize> = vehicles
            .iter()
            .flat_map(|vehicle| [vehicle.start_location, vehicle.end_location])
            .collect();

        let known_technicians: HashSet<i64> =
            vehicles.iter().map(|vehicle| vehicle.technician_id).collect();

        let fixed_by_item: HashMap<&str, &str> = request
            .fixed_constraints
            .iter()
            .map(|constraint| (constraint.item_id.as_str(), constraint.fixed_time_iso.as_str()))
            .collect();

        let max_priority = request
            .items
            .iter()
            .map(|item| item.priority)
            .max()
            .unwrap_or(1);

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if item.location_index >= num_locations {
                return Err(InputError::UnknownLocation {
                    item_id: item.id.clone(),
                    index: item.location_index,
                });
            }
            if item.duration_seconds < 0 {
                return Err(InputError::NegativeDuration {
                    item_id: item.id.clone(),
                    seconds: item.duration_seconds,
                });
            }

            let earliest_start = match &item.earliest_start_time_iso {
                Some(iso) => match parse_timestamp(iso) {
                    Ok(absolute) => relative(absolute),
                    Err(err) => {
                        warn!(item_id = %item.id, %err, "invalid earliest start, ignoring");
                        0
                    }
                },
                None => 0,
            };

            // The explicit constraint list takes precedence over the inline
            // fixed-time fields; both express the same hard start.
            let fixed_iso = fixed_by_item
                .get(item.id.as_str())
                .copied()
                .or_else(|| {
                    item.is_fixed_time
                        .then(|| item.fixed_time_iso.as_deref())
                        .flatten()
                });
            let fixed_start = match fixed_iso {
                Some(iso) => match parse_timestamp(iso) {
                    Ok(absolute) => Some(relative(absolute)),
                    Err(err) => {
                        warn!(item_id = %item.id, %err, "invalid fixed time, ignoring constraint");
                        None
                    }
                },
                None => None,
            };

            let eligible: BTreeSet<i64> = item.eligible_technician_ids.iter().copied().collect();
            let has_eligible_vehicle = eligible
                .iter()
                .any(|technician_id| known_technicians.contains(technician_id));

            let drop_penalty = if depot_locations.contains(&item.location_index) {
                warn!(item_id = %item.id, location = item.location_index,
                    "item sits on a depot location and cannot be served");
                None
            } else if !has_eligible_vehicle {
                None
            } else {
                let weight = (max_priority - item.priority + 1).max(1) as u64;
                Some(BASE_PENALTY * weight)
            };

            items.push(ItemNode {
                id: item.id.clone(),
                location: item.location_index,
                service: item.duration_seconds,
                priority: item.priority,
                eligible,
                earliest_start,
                fixed_start,
                drop_penalty,
            });
        }

        let max_window_end = vehicles
            .iter()
            .map(|vehicle| vehicle.window_end)
            .max()
            .unwrap_or(0);
        let horizon = (max_window_end + 12 * HOUR_SECONDS).max(24 * HOUR_SECONDS);

        Ok(Self {
            epoch,
            num_locations,
            vehicles,
            items,
            matrix: TravelMatrix::new(request.travel_time_matrix.clone()),
            horizon,
        })
    }

    /// Per-vehicle arc cost into an item: travel time, or the prohibitive
    /// sentinel when the arc is missing or the technician is ineligible for
    /// the destination.
    pub fn arc_cost(&self, vehicle: &Vehicle, from_location: usize, destination: &ItemNode) -> u64 {
        let travel = self.matrix.cost(from_location, destination.location);
        if travel >= INFEASIBLE_COST {
            return INFEASIBLE_COST;
        }
        if !destination.eligible.contains(&vehicle.technician_id) {
            return INFEASIBLE_COST;
        }
        travel
    }
}
