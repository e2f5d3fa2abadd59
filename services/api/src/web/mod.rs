pub mod auth;
pub mod books;
pub mod contacts;
pub mod middleware;
pub mod notifications;
pub mod requests;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use rest::{health_handler, ApiDoc};

use axum::http::StatusCode;
use bridgebook_core::ports::PortError;
use tracing::error;

/// Maps a store failure to a response. Unexpected causes are logged here
/// and kept opaque to the client.
pub(crate) fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Conflict(what) => (StatusCode::CONFLICT, what),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(cause) => {
            error!("Failed to {}: {}", context, cause);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", context),
            )
        }
    }
}
