//! services/api/src/web/requests.rs
//!
//! Handlers for the book request lifecycle: send a request, see both
//! sides of the ledger, and respond as the donor.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bridgebook_core::contact::ContactError;
use bridgebook_core::domain::{BookRequest, ContactView, RequestDecision, RequestWithBook};
use bridgebook_core::lifecycle::LifecycleError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{port_error_response, state::AppState};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateRequestPayload {
    pub book_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct RespondPayload {
    /// "approved" or "rejected".
    pub decision: String,
}

#[derive(Serialize, ToSchema)]
pub struct RequestResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub requester_id: Uuid,
    pub donor_id: Uuid,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookRequest> for RequestResponse {
    fn from(request: BookRequest) -> Self {
        Self {
            id: request.id,
            book_id: request.book_id,
            requester_id: request.requester_id,
            donor_id: request.donor_id,
            message: request.message,
            status: request.status.as_str().to_string(),
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// A ledger row as the request lists render it, with the book's
/// title/author joined in. The contact flags are present on approved
/// rows only.
#[derive(Serialize, ToSchema)]
pub struct RequestWithBookResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub book_author: String,
    pub requester_id: Uuid,
    pub donor_id: Uuid,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub viewer_shared_contact: Option<bool>,
    pub counterpart_shared_contact: Option<bool>,
}

impl RequestWithBookResponse {
    fn from_row(row: RequestWithBook, contact: Option<&ContactView>) -> Self {
        Self {
            id: row.request.id,
            book_id: row.request.book_id,
            book_title: row.book_title,
            book_author: row.book_author,
            requester_id: row.request.requester_id,
            donor_id: row.request.donor_id,
            message: row.request.message,
            status: row.request.status.as_str().to_string(),
            created_at: row.request.created_at,
            updated_at: row.request.updated_at,
            viewer_shared_contact: contact.map(|c| c.viewer_shared),
            counterpart_shared_contact: contact.map(|c| c.counterpart.is_some()),
        }
    }
}

fn contact_overview_error_response(e: ContactError) -> (StatusCode, String) {
    error!("Contact overview failure: {:?}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to load contact state".to_string(),
    )
}

fn lifecycle_error_response(e: LifecycleError) -> (StatusCode, String) {
    let status = match &e {
        LifecycleError::Validation(_) | LifecycleError::OwnBook => StatusCode::BAD_REQUEST,
        LifecycleError::DuplicateRequest
        | LifecycleError::AlreadyDecided
        | LifecycleError::InFlight => StatusCode::CONFLICT,
        LifecycleError::Forbidden => StatusCode::FORBIDDEN,
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::Store(cause) => {
            error!("Request lifecycle store failure: {:?}", cause);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process the request".to_string(),
            );
        }
    };
    (status, e.to_string())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Send a request for a listed book.
#[utoipa::path(
    post,
    path = "/requests",
    request_body = CreateRequestPayload,
    responses(
        (status = 201, description = "Request created", body = RequestResponse),
        (status = 400, description = "Book unavailable or your own listing"),
        (status = 404, description = "No such book"),
        (status = 409, description = "You already have a pending request for this book")
    )
)]
pub async fn create_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = state
        .lifecycle
        .create(user_id, payload.book_id)
        .await
        .map_err(lifecycle_error_response)?;

    Ok((StatusCode::CREATED, Json(RequestResponse::from(request))))
}

/// Requests other users sent for the caller's listings.
#[utoipa::path(
    get,
    path = "/requests/incoming",
    responses(
        (status = 200, description = "Requests for your books", body = [RequestWithBookResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn incoming_requests_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = state
        .requests
        .list_by_donor(user_id)
        .await
        .map_err(|e| port_error_response("list incoming requests", e))?;
    let contact_views = state
        .contacts
        .views_for(user_id, &rows)
        .await
        .map_err(contact_overview_error_response)?;

    Ok(Json(
        rows.into_iter()
            .map(|row| {
                let contact = contact_views.get(&row.request.id);
                RequestWithBookResponse::from_row(row, contact)
            })
            .collect::<Vec<_>>(),
    ))
}

/// Requests the caller has sent.
#[utoipa::path(
    get,
    path = "/requests/outgoing",
    responses(
        (status = 200, description = "Requests you sent", body = [RequestWithBookResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn outgoing_requests_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = state
        .requests
        .list_by_requester(user_id)
        .await
        .map_err(|e| port_error_response("list outgoing requests", e))?;
    let contact_views = state
        .contacts
        .views_for(user_id, &rows)
        .await
        .map_err(contact_overview_error_response)?;

    Ok(Json(
        rows.into_iter()
            .map(|row| {
                let contact = contact_views.get(&row.request.id);
                RequestWithBookResponse::from_row(row, contact)
            })
            .collect::<Vec<_>>(),
    ))
}

/// Approve or reject a pending request for one of the caller's books.
#[utoipa::path(
    post,
    path = "/requests/{id}/respond",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = RespondPayload,
    responses(
        (status = 200, description = "Decision applied", body = RequestResponse),
        (status = 403, description = "Not the donor of this request"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request already decided")
    )
)]
pub async fn respond_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<RespondPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let decision = RequestDecision::parse(&payload.decision).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown decision '{}'", payload.decision),
        )
    })?;

    let request = state
        .lifecycle
        .respond(user_id, request_id, decision)
        .await
        .map_err(lifecycle_error_response)?;

    Ok(Json(RequestResponse::from(request)))
}
