//! Training job endpoints
//!
//! POST /personas/:id/train, GET /personas/:id/progress, POST /personas/:id/cancel,
//! GET /personas/:id/model, GET /jobs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::persona_model::PersonaModel;
use crate::models::training_data::TrainingData;
use crate::models::training_job::{JobStatus, TrainingProgress};
use crate::services::training_orchestrator::PERSONA_MODEL_FILE;
use crate::utils::read_json_if_exists;
use crate::AppState;

/// POST /personas/:id/train response
#[derive(Debug, Serialize)]
pub struct StartTrainingResponse {
    pub persona_id: String,
    pub status: JobStatus,
}

/// POST /personas/:id/cancel response
#[derive(Debug, Serialize)]
pub struct CancelTrainingResponse {
    pub persona_id: String,
    pub cancelled: bool,
}

/// Persona ids become directory names under the root folder
fn validate_persona_id(persona_id: &str) -> ApiResult<()> {
    let valid = !persona_id.is_empty()
        && persona_id.len() <= 128
        && persona_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && persona_id != "."
        && persona_id != "..";
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid persona id: {}", persona_id)))
    }
}

/// POST /personas/:id/train
///
/// Starts a background job. 202 on start, 409 when the persona already has an active job.
pub async fn start_training(
    State(state): State<AppState>,
    Path(persona_id): Path<String>,
    Json(data): Json<TrainingData>,
) -> ApiResult<(StatusCode, Json<StartTrainingResponse>)> {
    validate_persona_id(&persona_id)?;
    if data.is_empty() {
        return Err(ApiError::BadRequest(
            "Training data contains no files".to_string(),
        ));
    }

    if state
        .orchestrator
        .submit(&persona_id, data, None)
        .await
        .is_none()
    {
        return Err(ApiError::Conflict(format!(
            "Training already in progress for persona {}",
            persona_id
        )));
    }
    tracing::info!(persona_id = %persona_id, "Training job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartTrainingResponse {
            persona_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// GET /personas/:id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(persona_id): Path<String>,
) -> ApiResult<Json<TrainingProgress>> {
    state
        .orchestrator
        .training_progress(&persona_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No training job for persona {}", persona_id)))
}

/// POST /personas/:id/cancel
///
/// 404 for unknown personas, 409 when the job already finished.
pub async fn cancel_training(
    State(state): State<AppState>,
    Path(persona_id): Path<String>,
) -> ApiResult<Json<CancelTrainingResponse>> {
    let status = state
        .orchestrator
        .jobs()
        .status(&persona_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No training job for persona {}", persona_id)))?;
    if status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Training job already finished: {:?}",
            status
        )));
    }

    let cancelled = state.orchestrator.cancel_training(&persona_id).await;
    Ok(Json(CancelTrainingResponse {
        persona_id,
        cancelled,
    }))
}

/// GET /personas/:id/model
pub async fn get_model(
    State(state): State<AppState>,
    Path(persona_id): Path<String>,
) -> ApiResult<Json<PersonaModel>> {
    validate_persona_id(&persona_id)?;
    let path = state
        .orchestrator
        .persona_dir(&persona_id)
        .join(PERSONA_MODEL_FILE);
    read_json_if_exists(&path)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No persona model for {}", persona_id)))
}

/// GET /jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<TrainingProgress>> {
    Json(state.orchestrator.jobs().list().await)
}

pub fn training_routes() -> Router<AppState> {
    Router::new()
        .route("/personas/:id/train", post(start_training))
        .route("/personas/:id/progress", get(get_progress))
        .route("/personas/:id/cancel", post(cancel_training))
        .route("/personas/:id/model", get(get_model))
        .route("/jobs", get(list_jobs))
}
