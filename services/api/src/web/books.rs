//! services/api/src/web/books.rs
//!
//! Handlers for the book catalog: browse, list your own shelf, donate,
//! and take a listing down.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bridgebook_core::domain::{Book, BookCategory, BookCondition, BookFilter, NewBook};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::{port_error_response, state::AppState};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A catalog entry as the front-end renders it, display attributes included.
#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub category: String,
    pub category_color: String,
    pub condition: String,
    pub condition_color: String,
    pub status: String,
    pub is_free_to_read: bool,
    pub is_featured: bool,
    pub donor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            category: book.category.as_str().to_string(),
            category_color: book.category.badge_color().to_string(),
            condition: book.condition.as_str().to_string(),
            condition_color: book.condition.badge_color().to_string(),
            status: book.status.as_str().to_string(),
            is_free_to_read: book.is_free_to_read,
            is_featured: book.is_featured,
            donor_id: book.donor_id,
            created_at: book.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateBookPayload {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub condition: String,
    #[serde(default)]
    pub is_free_to_read: bool,
}

#[derive(Deserialize, IntoParams)]
pub struct ListBooksQuery {
    /// Only books flagged (or not flagged) free-to-read.
    pub free_to_read: Option<bool>,
    /// Only featured (or non-featured) books.
    pub featured: Option<bool>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Browse the available catalog, newest first.
#[utoipa::path(
    get,
    path = "/books",
    params(ListBooksQuery),
    responses(
        (status = 200, description = "Available books", body = [BookResponse]),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBooksQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let filter = BookFilter {
        free_to_read: query.free_to_read,
        featured: query.featured,
    };
    let books = state
        .books
        .list_available(filter)
        .await
        .map_err(|e| port_error_response("list books", e))?;

    Ok(Json(
        books.into_iter().map(BookResponse::from).collect::<Vec<_>>(),
    ))
}

/// The caller's own listings, whatever their status.
#[utoipa::path(
    get,
    path = "/books/mine",
    responses(
        (status = 200, description = "Your listed books", body = [BookResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn my_books_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let books = state
        .books
        .list_by_donor(user_id)
        .await
        .map_err(|e| port_error_response("list your books", e))?;

    Ok(Json(
        books.into_iter().map(BookResponse::from).collect::<Vec<_>>(),
    ))
}

/// A single listing.
#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let book = state
        .books
        .get_book(book_id)
        .await
        .map_err(|e| port_error_response("fetch the book", e))?;

    Ok(Json(BookResponse::from(book)))
}

/// Donate a book: list it in the catalog under the caller's name.
#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookPayload,
    responses(
        (status = 201, description = "Book listed", body = BookResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateBookPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let title = payload.title.trim();
    let author = payload.author.trim();
    if title.is_empty() || author.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Title and author are required".to_string(),
        ));
    }
    // User input parses strictly; the lenient fallback is only for stored rows.
    let category = BookCategory::parse(&payload.category).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown category '{}'", payload.category),
        )
    })?;
    let condition = BookCondition::parse(&payload.condition).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown condition '{}'", payload.condition),
        )
    })?;

    let book = state
        .books
        .insert_book(NewBook {
            title: title.to_string(),
            author: author.to_string(),
            description: payload.description.trim().to_string(),
            category,
            condition,
            is_free_to_read: payload.is_free_to_read,
            donor_id: user_id,
        })
        .await
        .map_err(|e| port_error_response("list the book", e))?;

    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// Take a listing down. Only its donor may do this.
#[utoipa::path(
    delete,
    path = "/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 204, description = "Book removed"),
        (status = 403, description = "Not your listing"),
        (status = 404, description = "No such book")
    )
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let book = state
        .books
        .get_book(book_id)
        .await
        .map_err(|e| port_error_response("fetch the book", e))?;
    if book.donor_id != user_id {
        return Err((
            StatusCode::FORBIDDEN,
            "Only the donor may remove a listing".to_string(),
        ));
    }

    state
        .books
        .delete_book(book_id)
        .await
        .map_err(|e| port_error_response("remove the book", e))?;

    Ok(StatusCode::NO_CONTENT)
}
