use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AdminSession;
use crate::error::AppResult;
use crate::models::NotificationQueueEntry;
use crate::state::AppState;

const DEFAULT_PENDING_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct PendingQuery {
    pub limit: Option<usize>,
}

pub async fn list_failed(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<Vec<NotificationQueueEntry>>> {
    let entries = session.services(&state).notifications.list_failed().await?;
    Ok(Json(entries))
}

pub async fn list_pending(
    State(state): State<AppState>,
    session: AdminSession,
    Query(query): Query<PendingQuery>,
) -> AppResult<Json<Vec<NotificationQueueEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PENDING_LIMIT);
    let entries = session
        .services(&state)
        .notifications
        .list_pending(limit)
        .await?;
    Ok(Json(entries))
}

pub async fn requeue_notification(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<NotificationQueueEntry>> {
    let entry = session.services(&state).notifications.requeue(&id).await?;
    Ok(Json(entry))
}
