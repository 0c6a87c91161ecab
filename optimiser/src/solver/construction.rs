//! Cheapest-insertion construction.
//!
//! Fixed-time items are seeded first in ascending fixed time so the rest of
//! the construction works around them; dynamic items follow in descending
//! drop-penalty order (highest priority first). An item is inserted only when
//! the cheapest feasible insertion costs less than dropping it — with the
//! eligibility sentinel on ineligible arcs this also rules out any ineligible
//! placement.

use tracing::debug;

use crate::model::PlanningModel;

use super::best_insertion;

pub(crate) fn construct(model: &PlanningModel, log_search: bool) -> Vec<Vec<usize>> {
    let mut routes: Vec<Vec<usize>> = vec![Vec::new(); model.vehicles.len()];

    let serveable: Vec<usize> = model
        .items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.drop_penalty.is_some())
        .map(|(index, _)| index)
        .collect();

    let mut fixed: Vec<usize> = serveable
        .iter()
        .copied()
        .filter(|&index| model.items[index].fixed_start.is_some())
        .collect();
    fixed.sort_by(|&a, &b| {
        let left = &model.items[a];
        let right = &model.items[b];
        left.fixed_start
            .cmp(&right.fixed_start)
            .then_with(|| left.id.cmp(&right.id))
    });

    let mut dynamic: Vec<usize> = serveable
        .iter()
        .copied()
        .filter(|&index| model.items[index].fixed_start.is_none())
        .collect();
    dynamic.sort_by(|&a, &b| {
        let left = &model.items[a];
        let right = &model.items[b];
        right
            .drop_penalty
            .cmp(&left.drop_penalty)
            .then_with(|| left.id.cmp(&right.id))
    });

    for item_index in fixed.into_iter().chain(dynamic) {
        let penalty = model.items[item_index]
            .drop_penalty
            .expect("serveable items carry a penalty");
        match best_insertion(model, &routes, item_index) {
            Some((vehicle_index, position, delta)) if delta < penalty => {
                if log_search {
                    debug!(
                        item = %model.items[item_index].id,
                        vehicle_index,
                        position,
                        delta,
                        "construction: inserted"
                    );
                }
                routes[vehicle_index].insert(position, item_index);
            }
            _ => {
                if log_search {
                    debug!(
                        item = %model.items[item_index].id,
                        penalty,
                        "construction: dropped"
                    );
                }
            }
        }
    }

    routes
}
