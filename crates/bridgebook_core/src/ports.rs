//! crates/bridgebook_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Book, BookFilter, BookRequest, BookStatus, ContactDetails, ContactExchange, NewBook,
    NewNotification, Notification, RequestDecision, RequestParty, RequestWithBook, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting record already exists: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

/// The catalog of listed books.
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// Available books, newest first, optionally narrowed by `filter`.
    async fn list_available(&self, filter: BookFilter) -> PortResult<Vec<Book>>;

    /// Everything a donor has listed, regardless of status, newest first.
    async fn list_by_donor(&self, donor_id: Uuid) -> PortResult<Vec<Book>>;

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book>;

    async fn insert_book(&self, book: NewBook) -> PortResult<Book>;

    async fn set_book_status(&self, book_id: Uuid, status: BookStatus) -> PortResult<()>;

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()>;
}

/// The ledger of book requests.
#[async_trait]
pub trait RequestLedger: Send + Sync {
    async fn get_request(&self, request_id: Uuid) -> PortResult<BookRequest>;

    /// The pending request from `requester_id` for `book_id`, if one exists.
    async fn find_pending(&self, book_id: Uuid, requester_id: Uuid)
        -> PortResult<Option<BookRequest>>;

    /// Inserts a new request in the pending state. The store enforces the
    /// single-pending rule per (book, requester) and returns
    /// `PortError::Conflict` when a concurrent insert got there first.
    async fn insert_request(
        &self,
        book_id: Uuid,
        requester_id: Uuid,
        donor_id: Uuid,
        message: &str,
    ) -> PortResult<BookRequest>;

    /// Conditionally applies `decision` to a request that is still pending.
    /// Returns `false` when the request had already left the pending state,
    /// which is what makes the transition at-most-once.
    async fn decide_request(&self, request_id: Uuid, decision: RequestDecision)
        -> PortResult<bool>;

    /// Requests the user has sent, newest first.
    async fn list_by_requester(&self, requester_id: Uuid) -> PortResult<Vec<RequestWithBook>>;

    /// Requests for the user's listed books, newest first.
    async fn list_by_donor(&self, donor_id: Uuid) -> PortResult<Vec<RequestWithBook>>;
}

/// The per-request contact exchange records.
#[async_trait]
pub trait ContactExchangeStore: Send + Sync {
    async fn get_by_request(&self, request_id: Uuid) -> PortResult<Option<ContactExchange>>;

    /// The exchange records for a whole set of requests at once, as the
    /// request list views need them.
    async fn list_by_requests(&self, request_ids: &[Uuid]) -> PortResult<Vec<ContactExchange>>;

    /// Writes `party`'s own phone/address, inserting the exchange record on
    /// first share and overwriting only that party's fields afterwards.
    async fn upsert_party(
        &self,
        request_id: Uuid,
        party: RequestParty,
        details: &ContactDetails,
    ) -> PortResult<ContactExchange>;
}

/// The per-user notification outbox.
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    async fn push(&self, notification: NewNotification) -> PortResult<()>;

    async fn list_for_user(&self, user_id: Uuid) -> PortResult<Vec<Notification>>;

    /// Marks one of `user_id`'s own notifications as read.
    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> PortResult<()>;

    /// Marks every unread notification of `user_id` as read, returning the
    /// number of rows that flipped.
    async fn mark_all_read(&self, user_id: Uuid) -> PortResult<u64>;
}

/// User accounts and browser auth sessions.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
