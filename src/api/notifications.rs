//! Notification API endpoints backed directly by the repository.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::grouping::{group_notifications, DEFAULT_WINDOW_HOURS};
use crate::models::{CreateNotificationRequest, GroupedEntry, NotificationRecord};
use crate::AppState;

/// List query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Maximum number of results, capped at the feed limit.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Grouping window in hours (grouped view only).
    #[serde(default)]
    pub window_hours: Option<i64>,
}

impl ListQuery {
    fn effective_limit(&self, cap: usize) -> usize {
        self.limit.map_or(cap, |limit| limit.min(cap))
    }
}

/// GET /api/professionals/{pid}/notifications - Most recent notifications.
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<NotificationRecord>> {
    let limit = query.effective_limit(state.config.feed.limit);
    let notifications = state
        .repo
        .list_notifications(&professional_id, limit)
        .await?;
    success(notifications)
}

/// POST /api/professionals/{pid}/notifications - Create a notification.
pub async fn create_notification(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
    Json(request): Json<CreateNotificationRequest>,
) -> ApiResult<NotificationRecord> {
    let created = state
        .repo
        .create_notification(&professional_id, &request)
        .await?;
    tracing::info!(
        professional_id = %professional_id,
        id = %created.id,
        kind = created.kind.as_str(),
        "Notification created"
    );
    success(created)
}

/// GET /api/professionals/{pid}/notifications/grouped - Grouped view.
pub async fn list_grouped_notifications(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<GroupedEntry>> {
    let limit = query.effective_limit(state.config.feed.limit);
    let notifications = state
        .repo
        .list_notifications(&professional_id, limit)
        .await?;
    let window = query.window_hours.unwrap_or(DEFAULT_WINDOW_HOURS).max(0);
    success(group_notifications(&notifications, window))
}
