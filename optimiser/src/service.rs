//! HTTP surface of the optimisation service.
//!
//! Two routes: `POST /optimize-schedule` and `GET /health`. Malformed
//! requests produce a 400; everything else — including a panicking solve —
//! produces a structured `OptimizationResponse`, so callers can always rely
//! on the `status`/`unassignedItemIds` contract.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::api::{HealthResponse, OptimizationRequest, OptimizationResponse, OptimizationStatus};
use crate::model::{InputError, PlanningModel};
use crate::solver::{self, SolverSettings};
use crate::extract;

/// Shared server state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: SolverSettings,
}

/// Body of a 400 response.
#[derive(Debug, Serialize)]
pub struct RequestErrorBody {
    pub error: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/optimize-schedule", post(optimize))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OptimizationRequest>,
) -> Response {
    match run_optimization(request, state.settings.clone()).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(RequestErrorBody {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Validate, solve, and extract. Only input validation surfaces as `Err`;
/// solver failures are reported inside the response payload.
pub async fn run_optimization(
    request: OptimizationRequest,
    settings: SolverSettings,
) -> Result<OptimizationResponse, InputError> {
    info!(
        items = request.items.len(),
        technicians = request.technicians.len(),
        "received optimisation request"
    );

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

    let model = PlanningModel::from_request(&request)?;

    // The solve is CPU-bound and single-threaded per request; run it off the
    // async executor so concurrent requests each get their own worker.
    let items_for_failure = request.items.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let solution = solver::solve(&model, &settings);
        extract::build_response(&request, &model, &solution)
    })
    .await;

    match outcome {
        Ok(response) => Ok(response),
        Err(join_error) => {
            error!(%join_error, "optimisation task failed");
            Ok(OptimizationResponse::error_all_unassigned(
                "Internal error during optimization.",
                &items_for_failure,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ItemPayload, LocationRef, TechnicianPayload};
    use std::collections::HashMap;

    fn minimal_request() -> OptimizationRequest {
        let mut matrix = HashMap::new();
        matrix.insert(0, HashMap::from([(0, 0), (1, 600)]));
        matrix.insert(1, HashMap::from([(0, 600), (1, 0)]));
        OptimizationRequest {
            locations: vec![LocationRef { index: 0 }, LocationRef { index: 1 }],
            technicians: vec![TechnicianPayload {
                id: 1,
                start_location_index: 0,
                end_location_index: 0,
                earliest_start_time_iso: "2026-08-03T08:00:00Z".to_string(),
                latest_end_time_iso: "2026-08-03T17:00:00Z".to_string(),
            }],
            items: vec![ItemPayload {
                id: "unit-1".to_string(),
                location_index: 1,
                duration_seconds: 3600,
                priority: 1,
                eligible_technician_ids: vec![1],
                earliest_start_time_iso: None,
                is_fixed_time: false,
                fixed_time_iso: None,
            }],
            fixed_constraints: vec![],
            technician_unavailabilities: vec![],
            travel_time_matrix: matrix,
        }
    }

    #[tokio::test]
    async fn empty_items_short_circuits_to_success() {
        let mut request = minimal_request();
        request.items.clear();
        let response = run_optimization(request, SolverSettings::default())
            .await
            .unwrap();
        assert_eq!(response.status, OptimizationStatus::Success);
        assert!(response.routes.is_empty());
    }

    #[tokio::test]
    async fn no_technicians_reports_everything_unassigned() {
        let mut request = minimal_request();
        request.technicians.clear();
        let response = run_optimization(request, SolverSettings::default())
            .await
            .unwrap();
        assert_eq!(response.status, OptimizationStatus::Error);
        assert_eq!(response.unassigned_item_ids, vec!["unit-1"]);
    }

    #[tokio::test]
    async fn invalid_technician_window_is_an_input_error() {
        let mut request = minimal_request();
        request.technicians[0].earliest_start_time_iso = "08:00".to_string();
        let err = run_optimization(request, SolverSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::TechnicianWindow { .. }));
    }

    #[tokio::test]
    async fn simple_request_schedules_the_item() {
        let response = run_optimization(minimal_request(), SolverSettings::default())
            .await
            .unwrap();
        assert_eq!(response.status, OptimizationStatus::Success);
        assert_eq!(response.routes.len(), 1);
        assert_eq!(response.routes[0].stops[0].item_id, "unit-1");
    }
}
