//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the store ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use bridgebook_core::domain::{
    Book, BookCategory, BookCondition, BookFilter, BookRequest, BookStatus, ContactDetails,
    ContactExchange, NewBook, NewNotification, Notification, RequestDecision, RequestParty,
    RequestStatus, RequestWithBook, User, UserCredentials,
};
use bridgebook_core::ports::{
    AuthStore, BookCatalog, ContactExchangeStore, NotificationOutbox, PortError, PortResult,
    RequestLedger,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every store port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Postgres unique-constraint violation (SQLSTATE 23505).
fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    title: String,
    author: String,
    description: String,
    category: String,
    condition: String,
    status: String,
    is_free_to_read: bool,
    is_featured: bool,
    donor_id: Uuid,
    created_at: DateTime<Utc>,
}

impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            description: self.description,
            category: BookCategory::parse_or_default(&self.category),
            condition: BookCondition::parse_or_default(&self.condition),
            // An unrecognized status keeps the book off the shelf.
            status: BookStatus::parse(&self.status).unwrap_or(BookStatus::Unavailable),
            is_free_to_read: self.is_free_to_read,
            is_featured: self.is_featured,
            donor_id: self.donor_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct RequestRecord {
    id: Uuid,
    book_id: Uuid,
    requester_id: Uuid,
    donor_id: Uuid,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequestRecord {
    fn to_domain(self) -> PortResult<BookRequest> {
        let status = RequestStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!(
                "request {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        Ok(BookRequest {
            id: self.id,
            book_id: self.book_id,
            requester_id: self.requester_id,
            donor_id: self.donor_id,
            message: self.message,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct RequestWithBookRecord {
    id: Uuid,
    book_id: Uuid,
    requester_id: Uuid,
    donor_id: Uuid,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    book_title: String,
    book_author: String,
}

impl RequestWithBookRecord {
    fn to_domain(self) -> PortResult<RequestWithBook> {
        let request = RequestRecord {
            id: self.id,
            book_id: self.book_id,
            requester_id: self.requester_id,
            donor_id: self.donor_id,
            message: self.message,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .to_domain()?;
        Ok(RequestWithBook {
            request,
            book_title: self.book_title,
            book_author: self.book_author,
        })
    }
}

#[derive(FromRow)]
struct ContactExchangeRecord {
    id: Uuid,
    request_id: Uuid,
    donor_phone: Option<String>,
    donor_address: Option<String>,
    requester_phone: Option<String>,
    requester_address: Option<String>,
    updated_at: DateTime<Utc>,
}

impl ContactExchangeRecord {
    fn to_domain(self) -> ContactExchange {
        ContactExchange {
            id: self.id,
            request_id: self.request_id,
            donor_phone: self.donor_phone,
            donor_address: self.donor_address,
            requester_phone: self.requester_phone,
            requester_address: self.requester_address,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRecord {
    fn to_domain(self) -> Notification {
        Notification {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            read: self.read,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}

#[derive(FromRow)]
struct UserCredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

//=========================================================================================
// `BookCatalog` Trait Implementation
//=========================================================================================

#[async_trait]
impl BookCatalog for DbAdapter {
    async fn list_available(&self, filter: BookFilter) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            r#"
            SELECT id, title, author, description, category, condition, status,
                   is_free_to_read, is_featured, donor_id, created_at
              FROM books
             WHERE status = 'available'
               AND ($1::boolean IS NULL OR is_free_to_read = $1)
               AND ($2::boolean IS NULL OR is_featured = $2)
             ORDER BY created_at DESC
            "#,
        )
        .bind(filter.free_to_read)
        .bind(filter.featured)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_by_donor(&self, donor_id: Uuid) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            r#"
            SELECT id, title, author, description, category, condition, status,
                   is_free_to_read, is_featured, donor_id, created_at
              FROM books
             WHERE donor_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(donor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            r#"
            SELECT id, title, author, description, category, condition, status,
                   is_free_to_read, is_featured, donor_id, created_at
              FROM books
             WHERE id = $1
            "#,
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Book {} not found", book_id)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn insert_book(&self, book: NewBook) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            r#"
            INSERT INTO books (id, title, author, description, category, condition,
                               status, is_free_to_read, donor_id)
            VALUES ($1, $2, $3, $4, $5, $6, 'available', $7, $8)
            RETURNING id, title, author, description, category, condition, status,
                      is_free_to_read, is_featured, donor_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(book.category.as_str())
        .bind(book.condition.as_str())
        .bind(book.is_free_to_read)
        .bind(book.donor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn set_book_status(&self, book_id: Uuid, status: BookStatus) -> PortResult<()> {
        let result = sqlx::query("UPDATE books SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `RequestLedger` Trait Implementation
//=========================================================================================

#[async_trait]
impl RequestLedger for DbAdapter {
    async fn get_request(&self, request_id: Uuid) -> PortResult<BookRequest> {
        let record = sqlx::query_as::<_, RequestRecord>(
            r#"
            SELECT id, book_id, requester_id, donor_id, message, status, created_at, updated_at
              FROM book_requests
             WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Request {} not found", request_id))
            }
            _ => unexpected(e),
        })?;

        record.to_domain()
    }

    async fn find_pending(
        &self,
        book_id: Uuid,
        requester_id: Uuid,
    ) -> PortResult<Option<BookRequest>> {
        let record = sqlx::query_as::<_, RequestRecord>(
            r#"
            SELECT id, book_id, requester_id, donor_id, message, status, created_at, updated_at
              FROM book_requests
             WHERE book_id = $1 AND requester_id = $2 AND status = 'pending'
            "#,
        )
        .bind(book_id)
        .bind(requester_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(|r| r.to_domain()).transpose()
    }

    async fn insert_request(
        &self,
        book_id: Uuid,
        requester_id: Uuid,
        donor_id: Uuid,
        message: &str,
    ) -> PortResult<BookRequest> {
        let record = sqlx::query_as::<_, RequestRecord>(
            r#"
            INSERT INTO book_requests (id, book_id, requester_id, donor_id, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, book_id, requester_id, donor_id, message, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(requester_id)
        .bind(donor_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("pending request already exists".to_string())
            } else {
                unexpected(e)
            }
        })?;

        record.to_domain()
    }

    async fn decide_request(
        &self,
        request_id: Uuid,
        decision: RequestDecision,
    ) -> PortResult<bool> {
        // Conditional on the row still being pending, so the transition
        // applies at most once no matter how many responders race.
        let result = sqlx::query(
            r#"
            UPDATE book_requests
               SET status = $1, updated_at = now()
             WHERE id = $2 AND status = 'pending'
            "#,
        )
        .bind(decision.as_status().as_str())
        .bind(request_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_requester(&self, requester_id: Uuid) -> PortResult<Vec<RequestWithBook>> {
        let records = sqlx::query_as::<_, RequestWithBookRecord>(
            r#"
            SELECT r.id, r.book_id, r.requester_id, r.donor_id, r.message, r.status,
                   r.created_at, r.updated_at, b.title AS book_title, b.author AS book_author
              FROM book_requests r
              JOIN books b ON b.id = r.book_id
             WHERE r.requester_id = $1
             ORDER BY r.created_at DESC
            "#,
        )
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_by_donor(&self, donor_id: Uuid) -> PortResult<Vec<RequestWithBook>> {
        let records = sqlx::query_as::<_, RequestWithBookRecord>(
            r#"
            SELECT r.id, r.book_id, r.requester_id, r.donor_id, r.message, r.status,
                   r.created_at, r.updated_at, b.title AS book_title, b.author AS book_author
              FROM book_requests r
              JOIN books b ON b.id = r.book_id
             WHERE r.donor_id = $1
             ORDER BY r.created_at DESC
            "#,
        )
        .bind(donor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

//=========================================================================================
// `ContactExchangeStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContactExchangeStore for DbAdapter {
    async fn get_by_request(&self, request_id: Uuid) -> PortResult<Option<ContactExchange>> {
        let record = sqlx::query_as::<_, ContactExchangeRecord>(
            r#"
            SELECT id, request_id, donor_phone, donor_address,
                   requester_phone, requester_address, updated_at
              FROM contact_exchanges
             WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn list_by_requests(&self, request_ids: &[Uuid]) -> PortResult<Vec<ContactExchange>> {
        let records = sqlx::query_as::<_, ContactExchangeRecord>(
            r#"
            SELECT id, request_id, donor_phone, donor_address,
                   requester_phone, requester_address, updated_at
              FROM contact_exchanges
             WHERE request_id = ANY($1)
            "#,
        )
        .bind(request_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn upsert_party(
        &self,
        request_id: Uuid,
        party: RequestParty,
        details: &ContactDetails,
    ) -> PortResult<ContactExchange> {
        // One row per request; a re-share only touches the caller's columns.
        let sql = match party {
            RequestParty::Donor => {
                r#"
                INSERT INTO contact_exchanges (id, request_id, donor_phone, donor_address)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (request_id) DO UPDATE
                   SET donor_phone = EXCLUDED.donor_phone,
                       donor_address = EXCLUDED.donor_address,
                       updated_at = now()
                RETURNING id, request_id, donor_phone, donor_address,
                          requester_phone, requester_address, updated_at
                "#
            }
            RequestParty::Requester => {
                r#"
                INSERT INTO contact_exchanges (id, request_id, requester_phone, requester_address)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (request_id) DO UPDATE
                   SET requester_phone = EXCLUDED.requester_phone,
                       requester_address = EXCLUDED.requester_address,
                       updated_at = now()
                RETURNING id, request_id, donor_phone, donor_address,
                          requester_phone, requester_address, updated_at
                "#
            }
        };

        let record = sqlx::query_as::<_, ContactExchangeRecord>(sql)
            .bind(Uuid::new_v4())
            .bind(request_id)
            .bind(&details.phone)
            .bind(&details.address)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(record.to_domain())
    }
}

//=========================================================================================
// `NotificationOutbox` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationOutbox for DbAdapter {
    async fn push(&self, notification: NewNotification) -> PortResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> PortResult<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, user_id, kind, title, message, read, created_at
              FROM notifications
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> PortResult<()> {
        // Scoped to the owner so nobody can flip someone else's entry.
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(result.rows_affected())
    }
}

//=========================================================================================
// `AuthStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthStore for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (user_id, email, hashed_password)
            VALUES ($1, $2, $3)
            RETURNING user_id, email
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("email is already registered".to_string())
            } else {
                unexpected(e)
            }
        })?;

        Ok(User {
            user_id: record.user_id,
            email: record.email,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserCredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;

        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;

        Ok(row.0)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
