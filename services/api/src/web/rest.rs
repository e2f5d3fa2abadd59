//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, plus the health
//! probe.

use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::books::list_books_handler,
        crate::web::books::my_books_handler,
        crate::web::books::get_book_handler,
        crate::web::books::create_book_handler,
        crate::web::books::delete_book_handler,
        crate::web::requests::create_request_handler,
        crate::web::requests::incoming_requests_handler,
        crate::web::requests::outgoing_requests_handler,
        crate::web::requests::respond_request_handler,
        crate::web::contacts::get_contact_handler,
        crate::web::contacts::share_contact_handler,
        crate::web::notifications::list_notifications_handler,
        crate::web::notifications::mark_notification_read_handler,
        crate::web::notifications::mark_all_notifications_read_handler,
        health_handler,
    ),
    components(schemas(
        crate::web::auth::SignupRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::AuthResponse,
        crate::web::books::BookResponse,
        crate::web::books::CreateBookPayload,
        crate::web::requests::CreateRequestPayload,
        crate::web::requests::RespondPayload,
        crate::web::requests::RequestResponse,
        crate::web::requests::RequestWithBookResponse,
        crate::web::contacts::ShareContactPayload,
        crate::web::contacts::ContactDetailsResponse,
        crate::web::contacts::ContactViewResponse,
        crate::web::notifications::NotificationResponse,
        crate::web::notifications::MarkAllReadResponse,
    )),
    tags(
        (name = "BridgeBook API", description = "API endpoints for the book-sharing community.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Health
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up")
    )
)]
pub async fn health_handler() -> &'static str {
    "ok"
}
