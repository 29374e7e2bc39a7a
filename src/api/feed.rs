//! Live feed endpoints: every call goes through the professional's feed.

use axum::extract::{Path, State};
use serde::Serialize;

use super::{success, ApiResult};
use crate::feed::FeedSnapshot;
use crate::AppState;

/// Result of stopping a feed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStopped {
    pub was_running: bool,
}

/// GET /api/professionals/{pid}/feed - Snapshot of the live feed.
pub async fn get_feed(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
) -> ApiResult<FeedSnapshot> {
    let feed = state.feeds.get_or_start(&professional_id).await;
    success(feed.snapshot().await)
}

/// POST /api/professionals/{pid}/feed/refresh - Re-fetch the feed.
pub async fn refresh_feed(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
) -> ApiResult<FeedSnapshot> {
    let feed = state.feeds.get_or_start(&professional_id).await;
    feed.refresh().await;
    success(feed.snapshot().await)
}

/// PUT /api/professionals/{pid}/feed/{id}/read - Mark one notification read.
pub async fn mark_feed_notification_read(
    State(state): State<AppState>,
    Path((professional_id, id)): Path<(String, String)>,
) -> ApiResult<FeedSnapshot> {
    let feed = state.feeds.get_or_start(&professional_id).await;
    feed.mark_as_read(&id).await?;
    success(feed.snapshot().await)
}

/// PUT /api/professionals/{pid}/feed/read-all - Mark every unread notification read.
pub async fn mark_feed_all_read(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
) -> ApiResult<FeedSnapshot> {
    let feed = state.feeds.get_or_start(&professional_id).await;
    feed.mark_all_as_read().await?;
    success(feed.snapshot().await)
}

/// DELETE /api/professionals/{pid}/feed/{id} - Remove a notification.
pub async fn remove_feed_notification(
    State(state): State<AppState>,
    Path((professional_id, id)): Path<(String, String)>,
) -> ApiResult<FeedSnapshot> {
    let feed = state.feeds.get_or_start(&professional_id).await;
    feed.remove(&id).await?;
    success(feed.snapshot().await)
}

/// DELETE /api/professionals/{pid}/feed - Stop the live feed.
pub async fn stop_feed(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
) -> ApiResult<FeedStopped> {
    let was_running = state.feeds.stop(&professional_id).await;
    success(FeedStopped { was_running })
}
