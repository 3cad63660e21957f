use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;

use super::alerts::ChangeNotifier;
use super::domain::{ApplicantContext, CohortKey};
use super::recompute::RecomputeScheduler;
use super::repository::{CohortRepository, SnapshotStore};
use super::scoring::Factors;
use super::service::{ProbabilityService, ProbabilityServiceError};

/// Optional applicant overrides accepted as query parameters.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApplicantQuery {
    pub(crate) queue_position: Option<i64>,
    pub(crate) priority: Option<i64>,
    pub(crate) bonus_points: Option<f64>,
}

impl ApplicantQuery {
    fn into_context(self) -> Option<ApplicantContext> {
        if self.queue_position.is_none() && self.priority.is_none() && self.bonus_points.is_none()
        {
            return None;
        }
        Some(ApplicantContext {
            queue_position: self.queue_position,
            priority: self.priority,
            bonus_points: self.bonus_points,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    pub(crate) factors: Factors,
    #[serde(default)]
    pub(crate) month: Option<u32>,
    /// Reject invalid factors instead of clamping them.
    #[serde(default)]
    pub(crate) strict: bool,
}

/// Router builder exposing the cohort lookup and the pure calculator.
pub fn probability_router<R, S>(service: Arc<ProbabilityService<R, S>>) -> Router
where
    R: CohortRepository + 'static,
    S: SnapshotStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/facilities/:facility_id/age-groups/:age_group/probability",
            get(cohort_probability_handler::<R, S>),
        )
        .route("/api/v1/probability/score", post(score_handler::<R, S>))
        .with_state(service)
}

/// Router builder exposing a manual trigger for one recompute batch.
pub fn recompute_router<R, S, N>(scheduler: Arc<RecomputeScheduler<R, S, N>>) -> Router
where
    R: CohortRepository + 'static,
    S: SnapshotStore + 'static,
    N: ChangeNotifier + 'static,
{
    Router::new()
        .route("/api/v1/probability/recompute", post(recompute_handler::<R, S, N>))
        .with_state(scheduler)
}

pub(crate) async fn cohort_probability_handler<R, S>(
    State(service): State<Arc<ProbabilityService<R, S>>>,
    Path((facility_id, age_group)): Path<(String, String)>,
    Query(query): Query<ApplicantQuery>,
) -> Response
where
    R: CohortRepository + 'static,
    S: SnapshotStore + 'static,
{
    let key = CohortKey::new(facility_id, age_group);
    let applicant = query.into_context();

    match service.calculate(&key, applicant.as_ref(), Utc::now()) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) if err.is_not_found() => {
            let payload = json!({
                "error": err.to_string(),
                "facility_id": key.facility_id,
                "age_group": key.age_group,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(ProbabilityServiceError::Extraction(err)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn score_handler<R, S>(
    State(service): State<Arc<ProbabilityService<R, S>>>,
    axum::Json(request): axum::Json<ScoreRequest>,
) -> Response
where
    R: CohortRepository + 'static,
    S: SnapshotStore + 'static,
{
    let month = request.month.unwrap_or_else(|| Utc::now().month());
    if !(1..=12).contains(&month) {
        let payload = json!({ "error": format!("month must be between 1 and 12 (got {month})") });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }

    if request.strict {
        if let Err(err) = request.factors.validate() {
            let payload = json!({ "error": err.to_string() });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    }

    let result = service.score(&request.factors, month);
    (StatusCode::OK, axum::Json(result)).into_response()
}

pub(crate) async fn recompute_handler<R, S, N>(
    State(scheduler): State<Arc<RecomputeScheduler<R, S, N>>>,
) -> Response
where
    R: CohortRepository + 'static,
    S: SnapshotStore + 'static,
    N: ChangeNotifier + 'static,
{
    match scheduler.run_batch(Utc::now()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}
