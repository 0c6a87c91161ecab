//! Response extraction.
//!
//! Converts a relative-time solution back into the wire format. Per stop:
//! departure from the previous stop is its scheduled start plus its service
//! time (for the start depot, the technician's earliest start), physical
//! arrival is departure plus travel, and the scheduled start/end come from
//! the solved timeline. Every route is re-checked for eligibility before it
//! is emitted; a single ineligible stop invalidates the whole route.

use std::collections::HashSet;

use tracing::{error, info};

use crate::api::{
    OptimizationRequest, OptimizationResponse, OptimizationStatus, RouteStopPayload,
    TechnicianRoutePayload,
};
use crate::clock::format_timestamp;
use crate::model::PlanningModel;
use crate::solver::Solution;

pub fn build_response(
    request: &OptimizationRequest,
    model: &PlanningModel,
    solution: &Solution,
) -> OptimizationResponse {
    let mut routes = Vec::new();
    let mut assigned: HashSet<&str> = HashSet::new();

    for planned in &solution.routes {
        if planned.timing.stops.is_empty() {
            continue;
        }
        let vehicle = &model.vehicles[planned.vehicle_index];

        // Defensive re-validation: the cost model should make an ineligible
        // visit impossible, so any violation here is a solver bug and the
        // route is withheld entirely.
        let violation = planned.timing.stops.iter().find(|stop| {
            !model.items[stop.item]
                .eligible
                .contains(&vehicle.technician_id)
        });
        if let Some(stop) = violation {
            error!(
                technician_id = vehicle.technician_id,
                item = %model.items[stop.item].id,
                "route assigns an item to an ineligible technician, discarding route"
            );
            continue;
        }

        let mut stops = Vec::with_capacity(planned.timing.stops.len());
        let mut first_arrival_abs: Option<i64> = None;
        let mut last_end_abs: i64 = 0;
        let mut previous: Option<&crate::solver::StopTiming> = None;

        for stop in &planned.timing.stops {
            let item = &model.items[stop.item];
            let departure_from_prev = match previous {
                Some(prev) => prev.start + model.items[prev.item].service,
                None => vehicle.window_start,
            };
            let physical_arrival = departure_from_prev + stop.travel_from_prev as i64;

            let arrival_abs = physical_arrival + model.epoch;
            let start_abs = stop.start + model.epoch;
            let end_abs = stop.end + model.epoch;

            first_arrival_abs.get_or_insert(arrival_abs);
            last_end_abs = end_abs;

            stops.push(RouteStopPayload {
                item_id: item.id.clone(),
                arrival_time_iso: format_timestamp(arrival_abs),
                start_time_iso: format_timestamp(start_abs),
                end_time_iso: format_timestamp(end_abs),
            });
            previous = Some(stop);
        }

        for stop in &planned.timing.stops {
            assigned.insert(model.items[stop.item].id.as_str());
        }

        let total_duration_seconds = match first_arrival_abs {
            Some(first) => last_end_abs - first,
            None => 0,
        };

        routes.push(TechnicianRoutePayload {
            technician_id: vehicle.technician_id,
            stops,
            total_travel_time_seconds: planned.timing.total_travel,
            total_duration_seconds,
        });
    }

    let unassigned_item_ids: Vec<String> = request
        .items
        .iter()
        .filter(|item| !assigned.contains(item.id.as_str()))
        .map(|item| item.id.clone())
        .collect();

    let (status, message) = if unassigned_item_ids.is_empty() {
        (
            OptimizationStatus::Success,
            "Optimization successful. All items scheduled.".to_string(),
        )
    } else if unassigned_item_ids.len() < request.items.len() {
        (
            OptimizationStatus::Partial,
            format!(
                "Optimization partially successful. {} items could not be scheduled.",
                unassigned_item_ids.len()
            ),
        )
    } else {
        (
            OptimizationStatus::Error,
            "Optimization failed. No routes could be assigned.".to_string(),
        )
    };

    info!(
        objective = solution.objective,
        routes = routes.len(),
        unassigned = unassigned_item_ids.len(),
        "optimisation finished"
    );

    OptimizationResponse {
        status,
        message,
        routes,
        unassigned_item_ids,
    }
}
