use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicantId, FieldReviewInput, RequestId, RequestSubmission, StaffId, SubstanceItem,
    TransitionOutcome,
};
use super::review::ReviewError;
use super::service::{LifecycleEngine, LifecycleError};
use super::stages::{PipelineStage, StageDesk};

/// Shared handler state: the engine for request-scoped operations and the
/// desk facade for stage-scoped ones.
#[derive(Clone)]
pub struct PipelineRouterState {
    pub engine: Arc<LifecycleEngine>,
    pub desk: Arc<StageDesk>,
}

/// Router builder exposing the lifecycle engine and the four stage desks.
pub fn pipeline_router(engine: Arc<LifecycleEngine>, desk: Arc<StageDesk>) -> Router {
    let state = PipelineRouterState { engine, desk };
    Router::new()
        .route("/api/v1/requests", post(create_handler))
        .route(
            "/api/v1/requests/:id",
            get(detail_handler).delete(delete_handler),
        )
        .route("/api/v1/requests/:id/transition", post(transition_handler))
        .route("/api/v1/requests/:id/resubmit", post(resubmit_handler))
        .route(
            "/api/v1/requests/:id/reviews",
            get(list_reviews_handler).put(save_reviews_handler),
        )
        .route("/api/v1/requests/:id/substances", post(add_substance_handler))
        .route("/api/v1/stages/summary", get(summary_handler))
        .route("/api/v1/stages/:stage/inbox", get(inbox_handler))
        .route(
            "/api/v1/stages/:stage/requests/:id/validate",
            post(validate_handler),
        )
        .route(
            "/api/v1/stages/:stage/requests/:id/reject",
            post(reject_handler),
        )
        .route(
            "/api/v1/stages/:stage/requests/:id/return",
            post(return_handler),
        )
        .route(
            "/api/v1/stages/:stage/requests/:id/begin",
            post(begin_review_handler),
        )
        .route(
            "/api/v1/stages/:stage/requests/:id/forward",
            post(forward_handler),
        )
        .route(
            "/api/v1/stages/:stage/requests/:id/approve",
            post(approve_handler),
        )
        .route(
            "/api/v1/stages/:stage/requests/:id/resolution",
            post(resolution_handler),
        )
        .route(
            "/api/v1/stages/:stage/requests/:id/certificate",
            post(certificate_handler),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct FileRequestBody {
    pub applicant: String,
    #[serde(flatten)]
    pub submission: RequestSubmission,
}

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub target: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub origin_unit: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResubmitBody {
    pub applicant: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub submission: RequestSubmission,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    #[serde(default)]
    pub actor: Option<String>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewBatchBody {
    pub reviewer: String,
    pub entries: Vec<FieldReviewInput>,
}

#[derive(Debug, Deserialize)]
pub struct StaffActionBody {
    pub staff: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub staff: String,
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolutionBody {
    pub staff: String,
    pub number: String,
    pub issued_on: NaiveDate,
}

pub(crate) async fn create_handler(
    State(state): State<PipelineRouterState>,
    Json(body): Json<FileRequestBody>,
) -> Response {
    match state
        .engine
        .create(ApplicantId(body.applicant), body.submission)
    {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn detail_handler(
    State(state): State<PipelineRouterState>,
    Path(id): Path<String>,
) -> Response {
    match state.engine.full_detail(&RequestId(id)) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn transition_handler(
    State(state): State<PipelineRouterState>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Response {
    let outcome = state.engine.transition(
        &RequestId(id),
        &body.target,
        body.actor.map(StaffId),
        body.origin_unit.as_deref(),
        body.reason.as_deref(),
    );
    match outcome {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn resubmit_handler(
    State(state): State<PipelineRouterState>,
    Path(id): Path<String>,
    Json(body): Json<ResubmitBody>,
) -> Response {
    let updated = state.engine.resubmit_after_return(
        &RequestId(id),
        &ApplicantId(body.applicant),
        body.submission,
        body.reason.as_deref(),
    );
    match updated {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn delete_handler(
    State(state): State<PipelineRouterState>,
    Path(id): Path<String>,
    Json(body): Json<DeleteBody>,
) -> Response {
    match state
        .engine
        .delete(&RequestId(id), body.actor.map(StaffId), &body.reason)
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "deleted": true }))).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn list_reviews_handler(
    State(state): State<PipelineRouterState>,
    Path(id): Path<String>,
) -> Response {
    match state.engine.list_field_reviews(&RequestId(id)) {
        Ok(reviews) => (StatusCode::OK, Json(reviews)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn save_reviews_handler(
    State(state): State<PipelineRouterState>,
    Path(id): Path<String>,
    Json(body): Json<ReviewBatchBody>,
) -> Response {
    let saved = state.engine.save_field_reviews(
        &RequestId(id),
        body.entries,
        &StaffId(body.reviewer),
    );
    match saved {
        Ok(reviews) => (StatusCode::OK, Json(reviews)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn add_substance_handler(
    State(state): State<PipelineRouterState>,
    Path(id): Path<String>,
    Json(item): Json<SubstanceItem>,
) -> Response {
    match state.engine.add_substance(&RequestId(id), item) {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn summary_handler(State(state): State<PipelineRouterState>) -> Response {
    (StatusCode::OK, Json(state.desk.summary())).into_response()
}

pub(crate) async fn inbox_handler(
    State(state): State<PipelineRouterState>,
    Path(stage): Path<String>,
) -> Response {
    let stage = match resolve_stage(&stage) {
        Ok(stage) => stage,
        Err(response) => return response,
    };
    match state.desk.inbox(stage) {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn validate_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<StaffActionBody>,
) -> Response {
    stage_action(&stage, PipelineStage::IntakeDesk, || {
        state.desk.validate(&RequestId(id), StaffId(body.staff))
    })
}

pub(crate) async fn reject_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<DecisionBody>,
) -> Response {
    let stage = match resolve_stage(&stage) {
        Ok(stage) => stage,
        Err(response) => return response,
    };
    let outcome = state
        .desk
        .reject(stage, &RequestId(id), StaffId(body.staff), &body.detail);
    match outcome {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn return_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<DecisionBody>,
) -> Response {
    stage_action(&stage, PipelineStage::IntakeDesk, || {
        state
            .desk
            .return_to_applicant(&RequestId(id), StaffId(body.staff), &body.detail)
    })
}

pub(crate) async fn begin_review_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<StaffActionBody>,
) -> Response {
    stage_action(&stage, PipelineStage::TechnicalReview, || {
        state.desk.begin_review(&RequestId(id), StaffId(body.staff))
    })
}

pub(crate) async fn forward_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<StaffActionBody>,
) -> Response {
    stage_action(&stage, PipelineStage::TechnicalReview, || {
        state
            .desk
            .forward_to_directorate(&RequestId(id), StaffId(body.staff))
    })
}

pub(crate) async fn approve_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<StaffActionBody>,
) -> Response {
    stage_action(&stage, PipelineStage::Directorate, || {
        state.desk.approve(&RequestId(id), StaffId(body.staff))
    })
}

pub(crate) async fn resolution_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<ResolutionBody>,
) -> Response {
    stage_action(&stage, PipelineStage::Regulator, || {
        state.desk.issue_resolution(
            &RequestId(id),
            StaffId(body.staff),
            &body.number,
            body.issued_on,
        )
    })
}

pub(crate) async fn certificate_handler(
    State(state): State<PipelineRouterState>,
    Path((stage, id)): Path<(String, String)>,
    Json(body): Json<StaffActionBody>,
) -> Response {
    stage_action(&stage, PipelineStage::Regulator, || {
        state
            .desk
            .issue_certificate(&RequestId(id), StaffId(body.staff))
    })
}

/// Resolves the stage slug and gates the action on the desk that exposes it,
/// then renders the transition outcome.
fn stage_action<F>(raw_stage: &str, required: PipelineStage, action: F) -> Response
where
    F: FnOnce() -> Result<TransitionOutcome, LifecycleError>,
{
    let stage = match resolve_stage(raw_stage) {
        Ok(stage) => stage,
        Err(response) => return response,
    };
    if stage != required {
        let payload = json!({
            "error": format!("the {} does not expose this action", stage.label()),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }
    match action() {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

fn resolve_stage(raw: &str) -> Result<PipelineStage, Response> {
    PipelineStage::from_slug(raw).ok_or_else(|| {
        let payload = json!({ "error": format!("'{raw}' is not a pipeline stage") });
        (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
    })
}

pub(crate) fn lifecycle_error_response(error: LifecycleError) -> Response {
    let status = match &error {
        LifecycleError::Validation(_) | LifecycleError::UnknownState(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LifecycleError::RequestNotFound(_) | LifecycleError::ServiceTypeNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        LifecycleError::Forbidden { .. } => StatusCode::FORBIDDEN,
        LifecycleError::Finalized { .. } | LifecycleError::StaleState { .. } => {
            StatusCode::CONFLICT
        }
        LifecycleError::Store(_) | LifecycleError::Payment(_) | LifecycleError::Certificate(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}

pub(crate) fn review_error_response(error: ReviewError) -> Response {
    let status = match &error {
        ReviewError::EmptyFieldName { .. } | ReviewError::MissingComment { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ReviewError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}
