//! Local-search improvement.
//!
//! Three deterministic move families, applied first-improvement until a full
//! sweep yields nothing or the wall clock runs out:
//!
//! 1. re-insertion of dropped items whose cheapest feasible insertion is
//!    cheaper than their drop penalty,
//! 2. relocation of a single stop to any other position on any vehicle,
//! 3. intra-route 2-opt segment reversal.
//!
//! Every candidate sequence is re-evaluated for feasibility; a move is only
//! applied when it strictly decreases the objective, so the loop terminates.

use std::collections::HashSet;
use std::time::Instant;

use tracing::debug;

use crate::model::PlanningModel;

use super::{best_insertion, evaluate_route, insertion_delta, route_cost};

pub(crate) fn improve(
    model: &PlanningModel,
    routes: &mut Vec<Vec<usize>>,
    deadline: Instant,
    log_search: bool,
) {
    loop {
        if Instant::now() >= deadline {
            break;
        }
        let mut improved = false;
        improved |= reinsert_dropped(model, routes, deadline, log_search);
        improved |= relocate_pass(model, routes, deadline, log_search);
        improved |= two_opt_pass(model, routes, deadline, log_search);
        if !improved {
            break;
        }
    }
}

/// Try to serve items currently paying their drop penalty.
fn reinsert_dropped(
    model: &PlanningModel,
    routes: &mut [Vec<usize>],
    deadline: Instant,
    log_search: bool,
) -> bool {
    let served: HashSet<usize> = routes.iter().flatten().copied().collect();
    let mut dropped: Vec<usize> = model
        .items
        .iter()
        .enumerate()
        .filter(|(index, item)| item.drop_penalty.is_some() && !served.contains(index))
        .map(|(index, _)| index)
        .collect();
    dropped.sort_by(|&a, &b| {
        model.items[b]
            .drop_penalty
            .cmp(&model.items[a].drop_penalty)
            .then_with(|| model.items[a].id.cmp(&model.items[b].id))
    });

    let mut improved = false;
    for item_index in dropped {
        if Instant::now() >= deadline {
            break;
        }
        let penalty = model.items[item_index]
            .drop_penalty
            .expect("dropped candidates carry a penalty");
        if let Some((vehicle_index, position, delta)) = best_insertion(model, routes, item_index) {
            if delta < penalty {
                if log_search {
                    debug!(item = %model.items[item_index].id, vehicle_index, delta, "re-inserted");
                }
                routes[vehicle_index].insert(position, item_index);
                improved = true;
            }
        }
    }
    improved
}

/// Move one stop to a cheaper position, possibly on another vehicle.
/// First improvement: apply the first strictly improving move found.
fn relocate_pass(
    model: &PlanningModel,
    routes: &mut [Vec<usize>],
    deadline: Instant,
    log_search: bool,
) -> bool {
    for from_vehicle in 0..routes.len() {
        for from_position in 0..routes[from_vehicle].len() {
            if Instant::now() >= deadline {
                return false;
            }
            let item_index = routes[from_vehicle][from_position];
            let mut without = routes[from_vehicle].clone();
            without.remove(from_position);
            // Removal never breaks feasibility (waiting is allowed), so the
            // gain is a plain cost difference.
            let gain = route_cost(model, from_vehicle, &routes[from_vehicle])
                .saturating_sub(route_cost(model, from_vehicle, &without));

            for to_vehicle in 0..routes.len() {
                let target = if to_vehicle == from_vehicle {
                    without.clone()
                } else {
                    routes[to_vehicle].clone()
                };
                for to_position in 0..=target.len() {
                    if to_vehicle == from_vehicle && to_position == from_position {
                        continue;
                    }
                    let Some(delta) =
                        insertion_delta(model, to_vehicle, &target, to_position, item_index)
                    else {
                        continue;
                    };
                    if delta < gain {
                        if log_search {
                            debug!(
                                item = %model.items[item_index].id,
                                from_vehicle,
                                to_vehicle,
                                saved = gain - delta,
                                "relocated"
                            );
                        }
                        routes[from_vehicle] = without;
                        let mut inserted = if to_vehicle == from_vehicle {
                            routes[from_vehicle].clone()
                        } else {
                            routes[to_vehicle].clone()
                        };
                        inserted.insert(to_position, item_index);
                        routes[to_vehicle] = inserted;
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Reverse a segment of one route when that shortens it and stays feasible.
fn two_opt_pass(
    model: &PlanningModel,
    routes: &mut [Vec<usize>],
    deadline: Instant,
    log_search: bool,
) -> bool {
    for vehicle_index in 0..routes.len() {
        let length = routes[vehicle_index].len();
        if length < 3 {
            continue;
        }
        let current_cost = route_cost(model, vehicle_index, &routes[vehicle_index]);
        for i in 0..length - 1 {
            for j in i + 1..length {
                if Instant::now() >= deadline {
                    return false;
                }
                let mut candidate = routes[vehicle_index].clone();
                candidate[i..=j].reverse();
                let candidate_cost = route_cost(model, vehicle_index, &candidate);
                if candidate_cost < current_cost
                    && evaluate_route(model, &model.vehicles[vehicle_index], &candidate).is_some()
                {
                    if log_search {
                        debug!(
                            vehicle_index,
                            saved = current_cost - candidate_cost,
                            "2-opt reversal"
                        );
                    }
                    routes[vehicle_index] = candidate;
                    return true;
                }
            }
        }
    }
    false
}
