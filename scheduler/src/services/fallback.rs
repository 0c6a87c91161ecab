//! In-process route optimiser.
//!
//! Used when the optimisation service is unreachable, and as a deterministic
//! stand-in for it in engine tests. Order selection is intentionally simple:
//! exhaustive search over the stop order for small routes, nearest-neighbour
//! beyond that, with fixed-time items taking precedence. The shared timeline
//! and extraction from the optimiser library keep the response contract
//! identical to the remote service, so the engine treats both the same way;
//! the two may still disagree at the edges, and the service's verdict wins
//! whenever it is reachable.

use async_trait::async_trait;
use tracing::info;

use fieldline_optimiser::api::{
    OptimizationRequest, OptimizationResponse, OptimizationStatus,
};
use fieldline_optimiser::extract::build_response;
use fieldline_optimiser::model::{PlanningModel, Vehicle};
use fieldline_optimiser::solver::{evaluate_route, PlannedRoute, RouteTiming, Solution};

use super::optimiser_client::{Optimiser, OptimiserError};

/// Routes up to this long are ordered by exhaustive search.
const BRUTE_FORCE_LIMIT: usize = 8;

pub struct FallbackOptimiser {
    /// Floor applied to every travel entry before solving.
    pub min_travel_seconds: i64,
}

impl Default for FallbackOptimiser {
    fn default() -> Self {
        Self {
            min_travel_seconds: 300,
        }
    }
}

impl FallbackOptimiser {
    fn plan_vehicle(
        &self,
        model: &PlanningModel,
        vehicle_index: usize,
        candidates: &[usize],
    ) -> Vec<usize> {
        let vehicle = &model.vehicles[vehicle_index];
        if candidates.len() <= BRUTE_FORCE_LIMIT {
            if let Some(best) = best_permutation(model, vehicle, candidates) {
                return best;
            }
        }
        nearest_neighbour_fill(model, vehicle, candidates)
    }
}

#[async_trait]
impl Optimiser for FallbackOptimiser {
    async fn optimize(
        &self,
        request: &OptimizationRequest,
    ) -> Result<OptimizationResponse, OptimiserError> {
        if request.items.is_empty() {
            return Ok(OptimizationResponse {
                status: OptimizationStatus::Success,
                message: "No items provided for scheduling.".to_string(),
                routes: vec![],
                unassigned_item_ids: vec![],
            });
        }
        if request.technicians.is_empty() {
            return Ok(OptimizationResponse::error_all_unassigned(
                "No technicians available for scheduling.",
                &request.items,
            ));
        }

        // Apply the heuristic travel floor before building the model.
        let mut floored = request.clone();
        for row in floored.travel_time_matrix.values_mut() {
            for seconds in row.values_mut() {
                if *seconds >= 0 && *seconds < self.min_travel_seconds {
                    *seconds = self.min_travel_seconds;
                }
            }
        }

        let model = PlanningModel::from_request(&floored)
            .map_err(|err| OptimiserError::InvalidRequest(err.to_string()))?;

        let mut remaining: Vec<usize> = model
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.drop_penalty.is_some())
            .map(|(index, _)| index)
            .collect();

        let mut routes = Vec::new();
        let mut unserved_penalty: u64 = 0;
        let mut total_travel: u64 = 0;

        for vehicle_index in 0..model.vehicles.len() {
            let technician_id = model.vehicles[vehicle_index].technician_id;
            let candidates: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&index| model.items[index].eligible.contains(&technician_id))
                .collect();

            let sequence = self.plan_vehicle(&model, vehicle_index, &candidates);
            remaining.retain(|index| !sequence.contains(index));

            let timing = evaluate_route(&model, &model.vehicles[vehicle_index], &sequence)
                .unwrap_or_else(|| {
                    RouteTiming::empty(model.vehicles[vehicle_index].window_start)
                });
            total_travel += timing.total_travel;
            routes.push(PlannedRoute {
                vehicle_index,
                timing,
            });
        }

        let unserved: Vec<usize> = (0..model.items.len())
            .filter(|index| {
                !routes
                    .iter()
                    .any(|route| route.timing.stops.iter().any(|stop| stop.item == *index))
            })
            .collect();
        for &index in &unserved {
            unserved_penalty += model.items[index].drop_penalty.unwrap_or(0);
        }

        let solution = Solution {
            routes,
            unserved,
            objective: total_travel + unserved_penalty,
        };

        info!(
            items = request.items.len(),
            unserved = solution.unserved.len(),
            "fallback optimiser finished"
        );
        Ok(build_response(&floored, &model, &solution))
    }
}

/// Exhaustive search: the feasible order with the least total travel, ties
/// broken by the first order generated (lexicographic over candidate
/// positions, so the result is deterministic).
fn best_permutation(
    model: &PlanningModel,
    vehicle: &Vehicle,
    candidates: &[usize],
) -> Option<Vec<usize>> {
    let mut best: Option<(u64, Vec<usize>)> = None;
    let mut sequence = Vec::with_capacity(candidates.len());
    let mut used = vec![false; candidates.len()];
    permute(
        model,
        vehicle,
        candidates,
        &mut sequence,
        &mut used,
        &mut best,
    );
    best.map(|(_, order)| order)
}

fn permute(
    model: &PlanningModel,
    vehicle: &Vehicle,
    candidates: &[usize],
    sequence: &mut Vec<usize>,
    used: &mut Vec<bool>,
    best: &mut Option<(u64, Vec<usize>)>,
) {
    if sequence.len() == candidates.len() {
        if let Some(timing) = evaluate_route(model, vehicle, sequence) {
            if best
                .as_ref()
                .map(|(cost, _)| timing.total_travel < *cost)
                .unwrap_or(true)
            {
                *best = Some((timing.total_travel, sequence.clone()));
            }
        }
        return;
    }
    for position in 0..candidates.len() {
        if used[position] {
            continue;
        }
        used[position] = true;
        sequence.push(candidates[position]);
        permute(model, vehicle, candidates, sequence, used, best);
        sequence.pop();
        used[position] = false;
    }
}

/// Nearest-neighbour construction with a feasibility filter: fixed items
/// first in ascending fixed time, then repeatedly the closest remaining
/// location; anything that cannot be appended feasibly is skipped.
fn nearest_neighbour_fill(
    model: &PlanningModel,
    vehicle: &Vehicle,
    candidates: &[usize],
) -> Vec<usize> {
    let mut sequence: Vec<usize> = Vec::new();

    let mut fixed: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&index| model.items[index].fixed_start.is_some())
        .collect();
    fixed.sort_by_key(|&index| model.items[index].fixed_start);
    for index in fixed {
        let mut attempt = sequence.clone();
        attempt.push(index);
        if evaluate_route(model, vehicle, &attempt).is_some() {
            sequence = attempt;
        }
    }

    let mut pool: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&index| model.items[index].fixed_start.is_none())
        .collect();

    let mut current_location = sequence
        .last()
        .map(|&index| model.items[index].location)
        .unwrap_or(vehicle.start_location);

    while !pool.is_empty() {
        let nearest = pool
            .iter()
            .copied()
            .min_by_key(|&index| {
                (
                    model.matrix.cost(current_location, model.items[index].location),
                    index,
                )
            })
            .expect("pool is non-empty");
        pool.retain(|&index| index != nearest);

        let mut attempt = sequence.clone();
        attempt.push(nearest);
        if evaluate_route(model, vehicle, &attempt).is_some() {
            current_location = model.items[nearest].location;
            sequence = attempt;
        }
    }

    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldline_optimiser::api::{ItemPayload, LocationRef, TechnicianPayload};
    use std::collections::HashMap;

    fn request(items: Vec<ItemPayload>, travel: i64) -> OptimizationRequest {
        let size = items.len() + 1;
        let mut matrix = HashMap::new();
        for from in 0..size {
            let mut row = HashMap::new();
            for to in 0..size {
                row.insert(to, if from == to { 0 } else { travel });
            }
            matrix.insert(from, row);
        }
        OptimizationRequest {
            locations: (0..size).map(|index| LocationRef { index }).collect(),
            technicians: vec![TechnicianPayload {
                id: 1,
                start_location_index: 0,
                end_location_index: 0,
                earliest_start_time_iso: "2026-08-03T08:00:00Z".to_string(),
                latest_end_time_iso: "2026-08-03T17:00:00Z".to_string(),
            }],
            items,
            fixed_constraints: vec![],
            technician_unavailabilities: vec![],
            travel_time_matrix: matrix,
        }
    }

    fn item(id: &str, location: usize, duration: i64) -> ItemPayload {
        ItemPayload {
            id: id.to_string(),
            location_index: location,
            duration_seconds: duration,
            priority: 1,
            eligible_technician_ids: vec![1],
            earliest_start_time_iso: None,
            is_fixed_time: false,
            fixed_time_iso: None,
        }
    }

    #[tokio::test]
    async fn schedules_small_routes_exhaustively() {
        let fallback = FallbackOptimiser::default();
        let response = fallback
            .optimize(&request(
                vec![item("a", 1, 3600), item("b", 2, 3600)],
                600,
            ))
            .await
            .unwrap();

        assert_eq!(response.status, OptimizationStatus::Success);
        assert_eq!(response.routes[0].stops.len(), 2);
    }

    #[tokio::test]
    async fn applies_the_travel_floor() {
        let fallback = FallbackOptimiser::default();
        // 60s raw travel gets floored to 300s.
        let response = fallback
            .optimize(&request(vec![item("a", 1, 3600)], 60))
            .await
            .unwrap();

        let stop = &response.routes[0].stops[0];
        assert_eq!(stop.arrival_time_iso, "2026-08-03T08:05:00Z");
    }

    #[tokio::test]
    async fn respects_fixed_times() {
        let mut fixed = item("pinned", 1, 3600);
        fixed.is_fixed_time = true;
        fixed.fixed_time_iso = Some("2026-08-03T10:00:00Z".to_string());
        let response = FallbackOptimiser::default()
            .optimize(&request(vec![fixed, item("loose", 2, 3600)], 600))
            .await
            .unwrap();

        assert_eq!(response.status, OptimizationStatus::Success);
        let pinned = response.routes[0]
            .stops
            .iter()
            .find(|stop| stop.item_id == "pinned")
            .unwrap();
        assert_eq!(pinned.start_time_iso, "2026-08-03T10:00:00Z");
    }

    #[tokio::test]
    async fn drops_what_cannot_fit_and_reports_partial() {
        let response = FallbackOptimiser::default()
            .optimize(&request(
                vec![item("big", 1, 5 * 3600), item("bigger", 2, 5 * 3600)],
                600,
            ))
            .await
            .unwrap();

        assert_eq!(response.status, OptimizationStatus::Partial);
        assert_eq!(response.routes[0].stops.len(), 1);
        assert_eq!(response.unassigned_item_ids.len(), 1);
    }

    #[tokio::test]
    async fn handles_more_stops_than_the_brute_force_limit() {
        let items: Vec<ItemPayload> = (0..10)
            .map(|index| item(&format!("stop-{index}"), index + 1, 1200))
            .collect();
        let response = FallbackOptimiser::default()
            .optimize(&request(items, 300))
            .await
            .unwrap();

        // 10 × 20min service + 11 × 5min travel fits a 9h day.
        assert_eq!(response.status, OptimizationStatus::Success);
        assert_eq!(response.routes[0].stops.len(), 10);
    }
}
