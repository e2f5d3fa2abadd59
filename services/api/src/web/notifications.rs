//! services/api/src/web/notifications.rs
//!
//! Handlers for the caller's notification outbox.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bridgebook_core::domain::Notification;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{port_error_response, state::AppState};

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.title,
            message: n.message,
            read: n.read,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// How many notifications flipped from unread to read.
    pub updated: u64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Your notifications", body = [NotificationResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let notifications = state
        .notifications
        .list_for_user(user_id)
        .await
        .map_err(|e| port_error_response("list notifications", e))?;

    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Mark one of the caller's notifications as read.
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 404, description = "No such notification of yours")
    )
)]
pub async fn mark_notification_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .notifications
        .mark_read(user_id, notification_id)
        .await
        .map_err(|e| port_error_response("mark the notification as read", e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Mark every unread notification of the caller as read.
#[utoipa::path(
    post,
    path = "/notifications/read-all",
    responses(
        (status = 200, description = "All marked as read", body = MarkAllReadResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn mark_all_notifications_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let updated = state
        .notifications
        .mark_all_read(user_id)
        .await
        .map_err(|e| port_error_response("mark notifications as read", e))?;

    Ok(Json(MarkAllReadResponse { updated }))
}
