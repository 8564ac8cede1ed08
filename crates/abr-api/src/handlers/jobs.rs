//! Job cancellation.

use abr_models::JobId;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CancelResponse {
    pub message: String,
}

/// `DELETE /transcode/jobs/:job_id`
///
/// Only signals the job; subscribers see the `cancelled` update once the
/// encoders have stopped.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let job_id = JobId::from_string(job_id);
    info!(job_id = %job_id, "Cancellation requested");

    state.driver.cancel_job(&job_id)?;

    Ok(Json(CancelResponse {
        message: format!("Task {} cancelled successfully.", job_id),
    }))
}
