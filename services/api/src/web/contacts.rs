//! services/api/src/web/contacts.rs
//!
//! Handlers for the contact exchange attached to an approved request.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bridgebook_core::contact::ContactError;
use bridgebook_core::domain::{ContactDetails, ContactView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ShareContactPayload {
    pub phone: String,
    pub address: String,
}

#[derive(Serialize, ToSchema)]
pub struct ContactDetailsResponse {
    pub phone: String,
    pub address: String,
}

/// The exchange from the caller's side: the counterpart's details once
/// they shared, plus whether the caller has shared their own.
#[derive(Serialize, ToSchema)]
pub struct ContactViewResponse {
    pub counterpart: Option<ContactDetailsResponse>,
    pub viewer_shared: bool,
}

impl From<ContactView> for ContactViewResponse {
    fn from(view: ContactView) -> Self {
        Self {
            counterpart: view.counterpart.map(|d| ContactDetailsResponse {
                phone: d.phone,
                address: d.address,
            }),
            viewer_shared: view.viewer_shared,
        }
    }
}

fn contact_error_response(e: ContactError) -> (StatusCode, String) {
    let status = match &e {
        ContactError::Validation(_) => StatusCode::BAD_REQUEST,
        ContactError::NotApproved => StatusCode::CONFLICT,
        ContactError::Forbidden => StatusCode::FORBIDDEN,
        ContactError::NotFound(_) => StatusCode::NOT_FOUND,
        ContactError::Store(cause) => {
            error!("Contact exchange store failure: {:?}", cause);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process contact details".to_string(),
            );
        }
    };
    (status, e.to_string())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// What the caller may see of the exchange on this request.
#[utoipa::path(
    get,
    path = "/requests/{id}/contact",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "The exchange from your side", body = ContactViewResponse),
        (status = 403, description = "You are not a party to this request"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request is not approved")
    )
)]
pub async fn get_contact_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .contacts
        .view(user_id, request_id)
        .await
        .map_err(contact_error_response)?;

    Ok(Json(ContactViewResponse::from(view)))
}

/// Share (or overwrite) the caller's own phone/address on this request.
#[utoipa::path(
    put,
    path = "/requests/{id}/contact",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = ShareContactPayload,
    responses(
        (status = 200, description = "Details shared", body = ContactViewResponse),
        (status = 400, description = "Phone and address are both required"),
        (status = 403, description = "You are not a party to this request"),
        (status = 409, description = "Request is not approved")
    )
)]
pub async fn share_contact_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ShareContactPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .contacts
        .share(
            user_id,
            request_id,
            ContactDetails {
                phone: payload.phone,
                address: payload.address,
            },
        )
        .await
        .map_err(contact_error_response)?;

    // Answer with the refreshed view so the client renders the same thing
    // a subsequent GET would return.
    let view = state
        .contacts
        .view(user_id, request_id)
        .await
        .map_err(contact_error_response)?;

    Ok(Json(ContactViewResponse::from(view)))
}
