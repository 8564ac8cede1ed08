//! Upload handler that starts a transcoding job.

use std::path::Path;

use abr_models::job::extension_of;
use abr_models::{JobId, TranscodeSource};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the video.
pub const UPLOAD_FIELD: &str = "video";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeAccepted {
    pub message: String,
    pub task_id: String,
    pub status_stream_url: String,
}

/// `POST /transcode`
///
/// Saves the upload under a fresh job id and hands it to the driver. The
/// driver owns the file from then on, so a rejected source is already
/// deleted when the error reaches the client.
pub async fn start_transcode(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<TranscodeAccepted>)> {
    let job_id = JobId::new();
    let limit_mb = state.config.max_upload_mb;

    let mut source = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_mb))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Uploaded video has no filename"))?;
        let path = state
            .upload_dir
            .join(format!("{}{}", job_id, extension_of(&filename)));

        save_field(field, &path, limit_mb).await?;
        source = Some(TranscodeSource::new(path, filename));
        break;
    }

    let Some(source) = source else {
        metrics::record_upload("invalid");
        return Err(ApiError::bad_request(format!(
            "Missing '{}' file in form data",
            UPLOAD_FIELD
        )));
    };

    info!(
        job_id = %job_id,
        "Received file: {}, saved to {}",
        source.filename,
        source.path.display()
    );
    let filename = source.filename.clone();

    let job = state.driver.submit(job_id, source).await.map_err(|e| {
        metrics::record_upload("rejected");
        ApiError::from(e)
    })?;
    metrics::record_upload("accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(TranscodeAccepted {
            message: format!("Transcoding of {} started successfully.", filename),
            status_stream_url: format!("/transcode/status/{}", job.job_id),
            task_id: job.job_id.to_string(),
        }),
    ))
}

/// Stream one multipart field to disk, removing the partial file on error.
async fn save_field(mut field: Field<'_>, path: &Path, limit_mb: usize) -> ApiResult<()> {
    let guard = scopeguard::guard(path.to_path_buf(), |path| {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("Failed to remove partial upload {}: {}", path.display(), e);
        }
    });

    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, limit_mb))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    scopeguard::ScopeGuard::into_inner(guard);
    Ok(())
}

fn multipart_error(e: MultipartError, limit_mb: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        metrics::record_upload("invalid");
        ApiError::PayloadTooLarge(limit_mb)
    } else {
        ApiError::bad_request(e.body_text())
    }
}
