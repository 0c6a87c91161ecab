//! End-to-end optimisation scenarios exercised through the service layer.

use std::collections::HashMap;

use fieldline_optimiser::api::{
    ItemPayload, LocationRef, OptimizationRequest, OptimizationStatus, TechnicianPayload,
    UnavailabilityPayload,
};
use fieldline_optimiser::clock::parse_timestamp;
use fieldline_optimiser::service::run_optimization;
use fieldline_optimiser::solver::SolverSettings;

fn uniform_matrix(size: usize, seconds: i64) -> HashMap<usize, HashMap<usize, i64>> {
    let mut matrix = HashMap::new();
    for from in 0..size {
        let mut row = HashMap::new();
        for to in 0..size {
            row.insert(to, if from == to { 0 } else { seconds });
        }
        matrix.insert(from, row);
    }
    matrix
}

fn technician(id: i64, depot: usize) -> TechnicianPayload {
    TechnicianPayload {
        id,
        start_location_index: depot,
        end_location_index: depot,
        earliest_start_time_iso: "2026-08-03T08:00:00Z".to_string(),
        latest_end_time_iso: "2026-08-03T17:00:00Z".to_string(),
    }
}

fn item(id: &str, location: usize, duration: i64, priority: i32, eligible: Vec<i64>) -> ItemPayload {
    ItemPayload {
        id: id.to_string(),
        location_index: location,
        duration_seconds: duration,
        priority,
        eligible_technician_ids: eligible,
        earliest_start_time_iso: None,
        is_fixed_time: false,
        fixed_time_iso: None,
    }
}

fn request(
    locations: usize,
    technicians: Vec<TechnicianPayload>,
    items: Vec<ItemPayload>,
    travel_seconds: i64,
) -> OptimizationRequest {
    OptimizationRequest {
        locations: (0..locations).map(|index| LocationRef { index }).collect(),
        technicians,
        items,
        fixed_constraints: vec![],
        technician_unavailabilities: vec![],
        travel_time_matrix: uniform_matrix(locations, travel_seconds),
    }
}

#[tokio::test]
async fn two_jobs_no_constraints_fill_one_day() {
    let request = request(
        3,
        vec![technician(1, 0)],
        vec![
            item("j1", 1, 3600, 5, vec![1]),
            item("j2", 2, 3600, 5, vec![1]),
        ],
        600,
    );

    let response = run_optimization(request, SolverSettings::default())
        .await
        .unwrap();

    assert_eq!(response.status, OptimizationStatus::Success);
    let route = &response.routes[0];
    assert_eq!(route.stops.len(), 2);
    assert_eq!(route.stops[0].arrival_time_iso, "2026-08-03T08:10:00Z");

    let second_start = parse_timestamp(&route.stops[1].start_time_iso).unwrap();
    // First stop ends no earlier than 09:10 and the next leg takes 10 min.
    assert!(second_start >= parse_timestamp("2026-08-03T09:20:00Z").unwrap());
}

#[tokio::test]
async fn fixed_time_is_respected_exactly() {
    let mut req = request(
        3,
        vec![technician(1, 0)],
        vec![
            item("j1", 1, 3600, 5, vec![1]),
            item("j2", 2, 3600, 5, vec![1]),
        ],
        600,
    );
    req.items[1].is_fixed_time = true;
    req.items[1].fixed_time_iso = Some("2026-08-03T10:00:00Z".to_string());

    let response = run_optimization(req, SolverSettings::default()).await.unwrap();

    assert_eq!(response.status, OptimizationStatus::Success);
    let stops = &response.routes[0].stops;
    let fixed = stops.iter().find(|stop| stop.item_id == "j2").unwrap();
    assert_eq!(fixed.start_time_iso, "2026-08-03T10:00:00Z");
    assert!(stops.iter().any(|stop| stop.item_id == "j1"));
}

#[tokio::test]
async fn eligibility_excludes_a_technician() {
    let req = request(
        3,
        vec![technician(1, 0), technician(2, 0)],
        vec![item("j1", 1, 3600, 5, vec![2])],
        600,
    );

    let response = run_optimization(req, SolverSettings::default()).await.unwrap();

    assert_eq!(response.status, OptimizationStatus::Success);
    for route in &response.routes {
        let carries_j1 = route.stops.iter().any(|stop| stop.item_id == "j1");
        if route.technician_id == 2 {
            assert!(carries_j1);
        } else {
            assert!(!carries_j1);
        }
    }
}

#[tokio::test]
async fn unavailability_is_never_crossed() {
    let mut req = request(
        2,
        vec![technician(1, 0)],
        vec![item("j", 1, 7200, 5, vec![1])],
        600,
    );
    req.technician_unavailabilities = vec![UnavailabilityPayload {
        technician_id: 1,
        start_time_iso: "2026-08-03T12:00:00Z".to_string(),
        duration_seconds: 3600,
    }];

    let response = run_optimization(req, SolverSettings::default()).await.unwrap();

    assert_eq!(response.status, OptimizationStatus::Success);
    let stop = &response.routes[0].stops[0];
    let start = parse_timestamp(&stop.start_time_iso).unwrap();
    let end = parse_timestamp(&stop.end_time_iso).unwrap();
    let break_start = parse_timestamp("2026-08-03T12:00:00Z").unwrap();
    let break_end = parse_timestamp("2026-08-03T13:00:00Z").unwrap();

    assert!(
        end <= break_start || start >= break_end,
        "service {}..{} crosses the break",
        stop.start_time_iso,
        stop.end_time_iso
    );
}

#[tokio::test]
async fn higher_priority_wins_under_capacity_pressure() {
    // 9h window, two 5h jobs: only one can be served.
    let req = request(
        3,
        vec![technician(1, 0)],
        vec![
            item("j-hi", 1, 5 * 3600, 1, vec![1]),
            item("j-lo", 2, 5 * 3600, 5, vec![1]),
        ],
        600,
    );

    let response = run_optimization(req, SolverSettings::default()).await.unwrap();

    assert_eq!(response.status, OptimizationStatus::Partial);
    assert_eq!(response.unassigned_item_ids, vec!["j-lo"]);
    let stops = &response.routes[0].stops;
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].item_id, "j-hi");
}

#[tokio::test]
async fn stops_always_satisfy_arrival_start_end_ordering() {
    let req = request(
        5,
        vec![technician(1, 0)],
        vec![
            item("a", 1, 1800, 2, vec![1]),
            item("b", 2, 2700, 1, vec![1]),
            item("c", 3, 3600, 3, vec![1]),
            item("d", 4, 1200, 4, vec![1]),
        ],
        900,
    );

    let response = run_optimization(req, SolverSettings::default()).await.unwrap();

    for route in &response.routes {
        for stop in &route.stops {
            let arrival = parse_timestamp(&stop.arrival_time_iso).unwrap();
            let start = parse_timestamp(&stop.start_time_iso).unwrap();
            let end = parse_timestamp(&stop.end_time_iso).unwrap();
            assert!(arrival <= start);
            assert!(start <= end);
        }
    }
}

#[tokio::test]
async fn asymmetric_travel_times_are_honoured() {
    // depot→1 is 20 min but 1→depot is 5 min; the response must use the
    // directed values, never an average.
    let mut matrix = HashMap::new();
    matrix.insert(0, HashMap::from([(0, 0), (1, 1200)]));
    matrix.insert(1, HashMap::from([(0, 300), (1, 0)]));

    let req = OptimizationRequest {
        locations: vec![LocationRef { index: 0 }, LocationRef { index: 1 }],
        technicians: vec![technician(1, 0)],
        items: vec![item("j", 1, 3600, 1, vec![1])],
        fixed_constraints: vec![],
        technician_unavailabilities: vec![],
        travel_time_matrix: matrix,
    };

    let response = run_optimization(req, SolverSettings::default()).await.unwrap();
    let route = &response.routes[0];
    assert_eq!(route.stops[0].arrival_time_iso, "2026-08-03T08:20:00Z");
    assert_eq!(route.total_travel_time_seconds, 1500);
}
