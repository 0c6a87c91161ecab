//! Combinatorial core of the optimisation service.
//!
//! Two cooperating engines. The vrp-core evolutionary solver (fed through
//! the vrp-pragmatic format, see `pragmatic`) explores tour orders; a
//! deterministic pass — cheapest-insertion construction with fixed-time
//! items seeded first, then a local-search loop (re-insertion of dropped
//! items, relocation, intra-route 2-opt) under a wall-clock limit — owns
//! the contract. Every candidate is timed and costed by the in-crate
//! timeline and objective, so the evolutionary tours only replace the
//! deterministic result when they win on the contract's own cost model,
//! and the deterministic pass stands alone when the evolutionary solve
//! fails.
//!
//! The objective is total arc cost — travel seconds, with a prohibitive
//! sentinel on arcs into items the vehicle's technician is not eligible for —
//! plus a priority-scaled penalty for every serveable item left unserved.
//! Because the sentinel exceeds any penalty, dropping an item is always
//! cheaper than serving it ineligibly.

mod construction;
mod pragmatic;
mod search;
mod timeline;

pub use timeline::{evaluate_route, RouteTiming, StopTiming};

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::model::PlanningModel;

/// Search parameters.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Hard wall-clock limit for the improvement phase.
    pub time_limit: Duration,
    /// Emit a per-move search trace at debug level.
    pub log_search: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_millis(1000),
            log_search: false,
        }
    }
}

/// A timed route for one vehicle.
#[derive(Debug, Clone)]
pub struct PlannedRoute {
    /// Index into `PlanningModel::vehicles`.
    pub vehicle_index: usize,
    pub timing: RouteTiming,
}

/// Final solver output, still in relative time.
#[derive(Debug)]
pub struct Solution {
    pub routes: Vec<PlannedRoute>,
    /// Item indices not served by any route.
    pub unserved: Vec<usize>,
    pub objective: u64,
}

/// Arc-cost of one route (travel plus eligibility sentinels), including the
/// leg back to the end depot. No drop penalties.
pub(crate) fn route_cost(model: &PlanningModel, vehicle_index: usize, sequence: &[usize]) -> u64 {
    let vehicle = &model.vehicles[vehicle_index];
    let mut cost: u64 = 0;
    let mut previous_location = vehicle.start_location;
    for &item_index in sequence {
        let item = &model.items[item_index];
        cost = cost.saturating_add(model.arc_cost(vehicle, previous_location, item));
        previous_location = item.location;
    }
    if !sequence.is_empty() {
        cost = cost.saturating_add(model.matrix.cost(previous_location, vehicle.end_location));
    }
    cost
}

/// Cost delta of inserting `item_index` into `sequence` at `position`, or
/// `None` when the resulting sequence is infeasible.
pub(crate) fn insertion_delta(
    model: &PlanningModel,
    vehicle_index: usize,
    sequence: &[usize],
    position: usize,
    item_index: usize,
) -> Option<u64> {
    let mut candidate = Vec::with_capacity(sequence.len() + 1);
    candidate.extend_from_slice(&sequence[..position]);
    candidate.push(item_index);
    candidate.extend_from_slice(&sequence[position..]);

    evaluate_route(model, &model.vehicles[vehicle_index], &candidate)?;

    let before = route_cost(model, vehicle_index, sequence);
    let after = route_cost(model, vehicle_index, &candidate);
    Some(after.saturating_sub(before))
}

/// Cheapest feasible insertion of `item_index` across all routes.
/// Deterministic: ties break toward the lower vehicle index, then the
/// earlier position.
pub(crate) fn best_insertion(
    model: &PlanningModel,
    routes: &[Vec<usize>],
    item_index: usize,
) -> Option<(usize, usize, u64)> {
    let mut best: Option<(usize, usize, u64)> = None;
    for (vehicle_index, sequence) in routes.iter().enumerate() {
        for position in 0..=sequence.len() {
            if let Some(delta) = insertion_delta(model, vehicle_index, sequence, position, item_index)
            {
                let candidate = (vehicle_index, position, delta);
                best = match best {
                    Some(current) if current.2 <= delta => Some(current),
                    _ => Some(candidate),
                };
            }
        }
    }
    best
}

/// Total objective of a set of routes: arc costs plus drop penalties.
pub(crate) fn total_objective(model: &PlanningModel, routes: &[Vec<usize>]) -> u64 {
    let mut served = HashSet::new();
    let mut objective: u64 = 0;
    for (vehicle_index, sequence) in routes.iter().enumerate() {
        objective = objective.saturating_add(route_cost(model, vehicle_index, sequence));
        served.extend(sequence.iter().copied());
    }
    for (item_index, item) in model.items.iter().enumerate() {
        if !served.contains(&item_index) {
            if let Some(penalty) = item.drop_penalty {
                objective = objective.saturating_add(penalty);
            }
        }
    }
    objective
}

/// True when every per-vehicle sequence passes the timeline.
fn routes_feasible(model: &PlanningModel, routes: &[Vec<usize>]) -> bool {
    routes.len() == model.vehicles.len()
        && routes.iter().enumerate().all(|(vehicle_index, sequence)| {
            evaluate_route(model, &model.vehicles[vehicle_index], sequence).is_some()
        })
}

/// Solve the model within the configured wall-clock limit.
pub fn solve(model: &PlanningModel, settings: &SolverSettings) -> Solution {
    let deadline = Instant::now() + settings.time_limit;

    let mut routes = construction::construct(model, settings.log_search);
    search::improve(model, &mut routes, deadline, settings.log_search);

    // Evolutionary pass: worth running only when something is serveable.
    // Its tours are re-timed and re-costed here, and adopted only on a
    // strict objective improvement, so the result stays contract-exact.
    if model.items.iter().any(|item| item.drop_penalty.is_some()) {
        match pragmatic::solve_evolutionary(model, settings) {
            Ok(candidate) if routes_feasible(model, &candidate) => {
                let candidate_objective = total_objective(model, &candidate);
                let current_objective = total_objective(model, &routes);
                if candidate_objective < current_objective {
                    if settings.log_search {
                        debug!(
                            candidate_objective,
                            current_objective, "adopting evolutionary tours"
                        );
                    }
                    routes = candidate;
                }
            }
            Ok(_) => {
                debug!("evolutionary tours fail the timeline, keeping deterministic result");
            }
            Err(err) => {
                warn!(%err, "evolutionary solve failed, keeping deterministic result");
            }
        }
    }

    let mut planned = Vec::new();
    let mut served = HashSet::new();
    for (vehicle_index, sequence) in routes.iter().enumerate() {
        match evaluate_route(model, &model.vehicles[vehicle_index], sequence) {
            Some(timing) => {
                served.extend(timing.stops.iter().map(|stop| stop.item));
                planned.push(PlannedRoute {
                    vehicle_index,
                    timing,
                });
            }
            None => {
                // The search only ever keeps feasible sequences; an
                // infeasible final route indicates a solver bug, so the
                // route is abandoned rather than emitted.
                warn!(vehicle_index, "final route failed re-evaluation, dropping it");
                planned.push(PlannedRoute {
                    vehicle_index,
                    timing: RouteTiming::empty(model.vehicles[vehicle_index].window_start),
                });
            }
        }
    }

    let unserved: Vec<usize> = (0..model.items.len())
        .filter(|index| !served.contains(index))
        .collect();
    let objective = total_objective(model, &routes);

    if settings.log_search {
        debug!(
            objective,
            served = served.len(),
            unserved = unserved.len(),
            "search finished"
        );
    }

    Solution {
        routes: planned,
        unserved,
        objective,
    }
}
