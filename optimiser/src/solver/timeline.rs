//! Forward timeline evaluation for a single vehicle route.
//!
//! Given an ordered sequence of item indices, walks the route from the start
//! depot and computes arrival/start/end for every stop. Waiting is allowed
//! (the vehicle may idle before an earliest-start or fixed-time item); travel
//! and service may never overlap a break interval. Returns `None` when the
//! sequence violates any hard constraint: a missed fixed time, a prohibitive
//! arc, or a route that cannot return to the end depot inside the window.

use crate::api::INFEASIBLE_COST;
use crate::model::{BreakInterval, PlanningModel, Vehicle};

/// Computed times for one stop, in relative seconds.
#[derive(Debug, Clone)]
pub struct StopTiming {
    /// Index into `PlanningModel::items`.
    pub item: usize,
    /// Raw matrix travel from the previous stop (or start depot).
    pub travel_from_prev: u64,
    /// Earliest moment the vehicle is physically present, after any
    /// break-induced travel delay.
    pub arrival: i64,
    pub start: i64,
    pub end: i64,
}

/// Full timing of one route.
#[derive(Debug, Clone)]
pub struct RouteTiming {
    pub stops: Vec<StopTiming>,
    /// Sum of all travelled arcs, including the leg back to the end depot.
    pub total_travel: u64,
    /// Arrival back at the end depot.
    pub finish: i64,
}

impl RouteTiming {
    pub fn empty(window_start: i64) -> Self {
        Self {
            stops: vec![],
            total_travel: 0,
            finish: window_start,
        }
    }
}

/// Earliest `t' ≥ t` such that `[t', t' + len)` overlaps no break.
/// Breaks are sorted by start, so a single forward pass suffices.
fn next_free_start(mut t: i64, len: i64, breaks: &[BreakInterval]) -> i64 {
    for interval in breaks {
        if t < interval.end() && t + len > interval.start {
            t = interval.end();
        }
    }
    t
}

/// Evaluate `sequence` for `vehicle`, or `None` if infeasible.
pub fn evaluate_route(
    model: &PlanningModel,
    vehicle: &Vehicle,
    sequence: &[usize],
) -> Option<RouteTiming> {
    if sequence.is_empty() {
        return Some(RouteTiming::empty(vehicle.window_start));
    }

    let mut stops = Vec::with_capacity(sequence.len());
    let mut total_travel: u64 = 0;
    // The first departure is the technician's earliest start.
    let mut departure = vehicle.window_start;
    let mut previous_location = vehicle.start_location;

    for &item_index in sequence {
        let item = &model.items[item_index];
        let travel = model.matrix.cost(previous_location, item.location);
        if travel >= INFEASIBLE_COST {
            return None;
        }

        let travel_start = next_free_start(departure, travel as i64, &vehicle.breaks);
        let arrival = travel_start + travel as i64;

        let mut start = arrival.max(item.earliest_start);
        start = next_free_start(start, item.service, &vehicle.breaks);

        if let Some(fixed) = item.fixed_start {
            // The earliest feasible start must not have passed the fixed
            // time, and the fixed interval itself must avoid every break.
            if start > fixed {
                return None;
            }
            if next_free_start(fixed, item.service, &vehicle.breaks) != fixed {
                return None;
            }
            start = fixed;
        }

        let end = start + item.service;
        if end > vehicle.window_end || start > model.horizon {
            return None;
        }

        stops.push(StopTiming {
            item: item_index,
            travel_from_prev: travel,
            arrival,
            start,
            end,
        });

        total_travel += travel;
        departure = end;
        previous_location = item.location;
    }

    let return_travel = model.matrix.cost(previous_location, vehicle.end_location);
    if return_travel >= INFEASIBLE_COST {
        return None;
    }
    let return_start = next_free_start(departure, return_travel as i64, &vehicle.breaks);
    let finish = return_start + return_travel as i64;
    if finish > vehicle.window_end {
        return None;
    }
    total_travel += return_travel;

    Some(RouteTiming {
        stops,
        total_travel,
        finish,
    })
}
