//! Server-Sent Events stream of job status updates.

use std::convert::Infallible;

use abr_models::{JobId, StatusUpdate};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// `GET /transcode/status/:job_id`
///
/// The first event is the job's latest status. The stream ends when the
/// registry closes the mailbox; a client that disconnects first is
/// unsubscribed when the stream is dropped.
pub async fn stream_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job_id = JobId::from_string(job_id);
    let subscription = state.driver.subscribe(&job_id)?;
    debug!(job_id = %job_id, subscription_id = subscription.id, "Status stream opened");
    metrics::sse_stream_opened();

    let driver = state.driver.clone();
    let detach = scopeguard::guard(
        (job_id, subscription.id),
        move |(job_id, subscription_id)| {
            driver.unsubscribe(&job_id, subscription_id);
            metrics::sse_stream_closed();
            debug!(job_id = %job_id, subscription_id, "Status stream closed");
        },
    );

    let events = stream::unfold(
        (subscription, detach),
        |(mut subscription, detach)| async move {
            let update = subscription.recv().await?;
            Some((Ok(to_event(&update)), (subscription, detach)))
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_event(update: &StatusUpdate) -> Event {
    match serde_json::to_string(update) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            warn!("Failed to serialize status update: {}", e);
            Event::default().comment("unserializable status update")
        }
    }
}
