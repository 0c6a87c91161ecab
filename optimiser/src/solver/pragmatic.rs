//! vrp-pragmatic solver integration.
//!
//! Builds a pragmatic-format problem from the planning model and runs the
//! vrp-core evolutionary solver over it: eligibility becomes a one-of skill
//! match, a fixed time becomes a point time window, an unavailability becomes
//! a required break with a pinned start, and the travel matrix is flattened
//! with the prohibitive sentinel standing in for missing arcs. Only the
//! visit ORDER is taken from the returned tours — timing, feasibility, and
//! cost accounting stay with the in-crate timeline so the wire contract's
//! constants apply exactly.

use std::collections::HashMap;
use std::io::BufWriter;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use vrp_cli::extensions::solve::config::{create_builder_from_config, Config, TerminationConfig};
use vrp_core::solver::Solver;
use vrp_pragmatic::format::problem::{Matrix, PragmaticProblem, Problem};
use vrp_pragmatic::format::solution::{
    write_pragmatic, PragmaticOutputType, Solution as PragmaticSolution,
};

use crate::clock::format_timestamp;
use crate::model::{ItemNode, PlanningModel, Vehicle};

use super::SolverSettings;

pub(crate) const MATRIX_PROFILE: &str = "car";
const MAX_GENERATIONS: usize = 3000;

/// Run the evolutionary solver and return the visit order per vehicle
/// (indices into `model.items`).
pub(crate) fn solve_evolutionary(
    model: &PlanningModel,
    settings: &SolverSettings,
) -> Result<Vec<Vec<usize>>> {
    let problem_json = build_problem(model);
    let problem_format: Problem = serde_json::from_value(problem_json)
        .context("failed to deserialize pragmatic problem")?;

    let matrix = build_matrix(model);
    let core_problem = (problem_format, vec![matrix])
        .read_pragmatic()
        .context("failed to build core problem from pragmatic format")?;

    let core_problem = Arc::new(core_problem);
    let solver_config = build_solver_config(core_problem.clone(), settings)?;

    let solution = Solver::new(core_problem.clone(), solver_config)
        .solve()
        .context("evolutionary solve failed")?;

    let pragmatic = write_pragmatic_solution(core_problem.as_ref(), &solution)?;
    Ok(map_tours(model, &pragmatic))
}

fn build_solver_config(
    problem: Arc<vrp_core::models::Problem>,
    settings: &SolverSettings,
) -> Result<vrp_core::rosomaxa::evolution::EvolutionConfig<
    vrp_core::solver::RefinementContext,
    vrp_core::models::GoalContext,
    vrp_core::construction::heuristics::InsertionContext,
>> {
    let config = Config {
        termination: Some(TerminationConfig {
            max_time: Some(settings.time_limit.as_secs().max(1) as usize),
            max_generations: Some(MAX_GENERATIONS),
            variation: None,
        }),
        evolution: None,
        hyper: None,
        environment: None,
        telemetry: None,
        output: None,
    };

    let builder = create_builder_from_config(problem, Vec::new(), &config)
        .context("failed to create solver builder")?;

    builder.build().context("failed to build solver configuration")
}

fn write_pragmatic_solution(
    problem: &vrp_core::models::Problem,
    solution: &vrp_core::models::Solution,
) -> Result<PragmaticSolution> {
    let mut writer = BufWriter::new(Vec::new());
    write_pragmatic(problem, solution, PragmaticOutputType::default(), &mut writer)
        .context("failed to serialize pragmatic solution")?;

    let bytes = writer.into_inner().context("failed to flush solution writer")?;
    let text = String::from_utf8(bytes).context("solution is not valid UTF-8")?;
    let parsed: PragmaticSolution =
        serde_json::from_str(&text).context("failed to parse pragmatic solution JSON")?;

    Ok(parsed)
}

fn skill_tag(technician_id: i64) -> String {
    format!("tech-{technician_id}")
}

fn vehicle_type_id(vehicle: &Vehicle) -> String {
    skill_tag(vehicle.technician_id)
}

fn absolute_iso(model: &PlanningModel, relative: i64) -> String {
    format_timestamp(model.epoch + relative)
}

fn build_job(model: &PlanningModel, item: &ItemNode) -> Value {
    let mut place = json!({
        "location": { "index": item.location },
        "duration": item.service,
    });

    // A fixed time is a point window: arrival must land exactly on it. A
    // bare earliest-start keeps the upper bound at the planning horizon.
    if let Some(fixed) = item.fixed_start {
        let pinned = absolute_iso(model, fixed);
        place["times"] = json!([[pinned.clone(), pinned]]);
    } else if item.earliest_start > 0 {
        place["times"] = json!([[
            absolute_iso(model, item.earliest_start),
            absolute_iso(model, model.horizon),
        ]]);
    }

    let eligible_tags: Vec<String> = item.eligible.iter().copied().map(skill_tag).collect();

    json!({
        "id": item.id,
        "services": [{
            "places": [place]
        }],
        "skills": { "oneOf": eligible_tags },
        "priority": item.priority.max(1),
    })
}

fn build_vehicle(model: &PlanningModel, vehicle: &Vehicle) -> Value {
    let breaks: Vec<Value> = vehicle
        .breaks
        .iter()
        .map(|interval| {
            let pinned = absolute_iso(model, interval.start);
            json!({
                "time": { "earliest": pinned.clone(), "latest": pinned },
                "duration": interval.duration,
            })
        })
        .collect();

    json!({
        "typeId": vehicle_type_id(vehicle),
        "vehicleIds": [format!("{}-1", vehicle_type_id(vehicle))],
        "profile": { "matrix": MATRIX_PROFILE },
        "costs": {
            "fixed": 0.0,
            "distance": 1.0,
            "time": 1.0
        },
        "shifts": [{
            "start": {
                "earliest": absolute_iso(model, vehicle.window_start),
                "location": { "index": vehicle.start_location }
            },
            "end": {
                "latest": absolute_iso(model, vehicle.window_end),
                "location": { "index": vehicle.end_location }
            },
            "breaks": breaks
        }],
        "capacity": [1000],
        "skills": [skill_tag(vehicle.technician_id)],
    })
}

fn build_problem(model: &PlanningModel) -> Value {
    // Items the model cannot serve (no penalty) are left out entirely.
    let jobs: Vec<Value> = model
        .items
        .iter()
        .filter(|item| item.drop_penalty.is_some())
        .map(|item| build_job(model, item))
        .collect();

    let vehicles: Vec<Value> = model
        .vehicles
        .iter()
        .map(|vehicle| build_vehicle(model, vehicle))
        .collect();

    json!({
        "plan": {
            "jobs": jobs
        },
        "fleet": {
            "vehicles": vehicles,
            "profiles": [{
                "name": MATRIX_PROFILE
            }]
        }
    })
}

/// Flatten the sparse wire matrix into the dense row-major form the
/// pragmatic format expects. Missing arcs carry the prohibitive sentinel,
/// and distances mirror durations so both cost terms rank orders the same
/// way.
fn build_matrix(model: &PlanningModel) -> Matrix {
    let size = model.num_locations;
    let mut travel_times = Vec::with_capacity(size * size);
    for from in 0..size {
        for to in 0..size {
            travel_times.push(model.matrix.cost(from, to) as i64);
        }
    }

    Matrix {
        profile: Some(MATRIX_PROFILE.to_string()),
        timestamp: None,
        distances: travel_times.clone(),
        travel_times,
        error_codes: None,
    }
}

/// Map the returned tours back onto per-vehicle item sequences. Activities
/// that are not items (departures, arrivals, breaks) simply do not resolve.
fn map_tours(model: &PlanningModel, solution: &PragmaticSolution) -> Vec<Vec<usize>> {
    let item_by_id: HashMap<&str, usize> = model
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| (item.id.as_str(), index))
        .collect();

    let mut routes = vec![Vec::new(); model.vehicles.len()];
    let mut seen = vec![false; model.items.len()];
    for tour in &solution.tours {
        let Some(vehicle_index) = model
            .vehicles
            .iter()
            .position(|vehicle| vehicle_type_id(vehicle) == tour.type_id)
        else {
            continue;
        };
        for stop in &tour.stops {
            for activity in stop.activities() {
                if activity.activity_type == "departure" || activity.activity_type == "arrival" {
                    continue;
                }
                if let Some(&item_index) = item_by_id.get(activity.job_id.as_str()) {
                    if !seen[item_index] {
                        seen[item_index] = true;
                        routes[vehicle_index].push(item_index);
                    }
                }
            }
        }
    }
    routes
}
