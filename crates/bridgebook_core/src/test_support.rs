//! crates/bridgebook_core/src/test_support.rs
//!
//! In-memory implementations of the store ports, with the same contracts
//! the Postgres adapter honors (single-pending rule, conditional decide,
//! owner-scoped reads). Used by the unit tests of the core flows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Book, BookCategory, BookCondition, BookFilter, BookRequest, BookStatus, ContactDetails,
    ContactExchange, NewBook, NewNotification, Notification, RequestDecision, RequestParty,
    RequestStatus, RequestWithBook,
};
use crate::ports::{
    BookCatalog, ContactExchangeStore, NotificationOutbox, PortError, PortResult, RequestLedger,
};

pub fn sample_book(donor_id: Uuid, title: &str, author: &str) -> Book {
    Book {
        id: Uuid::new_v4(),
        title: title.to_string(),
        author: author.to_string(),
        description: String::new(),
        category: BookCategory::Adventure,
        condition: BookCondition::Good,
        status: BookStatus::Available,
        is_free_to_read: false,
        is_featured: false,
        donor_id,
        created_at: Utc::now(),
    }
}

//=========================================================================================
// Catalog
//=========================================================================================

#[derive(Default)]
pub struct MemoryCatalog {
    pub books: Mutex<Vec<Book>>,
}

impl MemoryCatalog {
    pub fn seed(&self, book: Book) {
        self.books.lock().unwrap().push(book);
    }
}

#[async_trait]
impl BookCatalog for MemoryCatalog {
    async fn list_available(&self, filter: BookFilter) -> PortResult<Vec<Book>> {
        let books = self.books.lock().unwrap();
        let mut matches: Vec<Book> = books
            .iter()
            .filter(|b| b.status == BookStatus::Available)
            .filter(|b| filter.free_to_read.map_or(true, |v| b.is_free_to_read == v))
            .filter(|b| filter.featured.map_or(true, |v| b.is_featured == v))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn list_by_donor(&self, donor_id: Uuid) -> PortResult<Vec<Book>> {
        let books = self.books.lock().unwrap();
        Ok(books
            .iter()
            .filter(|b| b.donor_id == donor_id)
            .cloned()
            .collect())
    }

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book> {
        let books = self.books.lock().unwrap();
        books
            .iter()
            .find(|b| b.id == book_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn insert_book(&self, book: NewBook) -> PortResult<Book> {
        let stored = Book {
            id: Uuid::new_v4(),
            title: book.title,
            author: book.author,
            description: book.description,
            category: book.category,
            condition: book.condition,
            status: BookStatus::Available,
            is_free_to_read: book.is_free_to_read,
            is_featured: false,
            donor_id: book.donor_id,
            created_at: Utc::now(),
        };
        self.books.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn set_book_status(&self, book_id: Uuid, status: BookStatus) -> PortResult<()> {
        let mut books = self.books.lock().unwrap();
        let book = books
            .iter_mut()
            .find(|b| b.id == book_id)
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?;
        book.status = status;
        Ok(())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        let mut books = self.books.lock().unwrap();
        let before = books.len();
        books.retain(|b| b.id != book_id);
        if books.len() == before {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// Ledger
//=========================================================================================

#[derive(Default)]
pub struct MemoryLedger {
    pub requests: Mutex<Vec<BookRequest>>,
    /// Request ids fetched via `get_request`, for asserting on round-trips.
    pub reads: Mutex<Vec<Uuid>>,
    /// Forces the next insert to collide, as if a concurrent create won.
    pub conflict_on_insert: AtomicBool,
}

#[async_trait]
impl RequestLedger for MemoryLedger {
    async fn get_request(&self, request_id: Uuid) -> PortResult<BookRequest> {
        self.reads.lock().unwrap().push(request_id);
        let requests = self.requests.lock().unwrap();
        requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Request {} not found", request_id)))
    }

    async fn find_pending(
        &self,
        book_id: Uuid,
        requester_id: Uuid,
    ) -> PortResult<Option<BookRequest>> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .iter()
            .find(|r| {
                r.book_id == book_id
                    && r.requester_id == requester_id
                    && r.status == RequestStatus::Pending
            })
            .cloned())
    }

    async fn insert_request(
        &self,
        book_id: Uuid,
        requester_id: Uuid,
        donor_id: Uuid,
        message: &str,
    ) -> PortResult<BookRequest> {
        let mut requests = self.requests.lock().unwrap();
        let collided = self.conflict_on_insert.swap(false, Ordering::SeqCst)
            || requests.iter().any(|r| {
                r.book_id == book_id
                    && r.requester_id == requester_id
                    && r.status == RequestStatus::Pending
            });
        if collided {
            return Err(PortError::Conflict(
                "pending request already exists".to_string(),
            ));
        }
        let now = Utc::now();
        let request = BookRequest {
            id: Uuid::new_v4(),
            book_id,
            requester_id,
            donor_id,
            message: message.to_string(),
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        requests.push(request.clone());
        Ok(request)
    }

    async fn decide_request(
        &self,
        request_id: Uuid,
        decision: RequestDecision,
    ) -> PortResult<bool> {
        let mut requests = self.requests.lock().unwrap();
        match requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == RequestStatus::Pending)
        {
            Some(request) => {
                request.status = decision.as_status();
                request.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_requester(&self, requester_id: Uuid) -> PortResult<Vec<RequestWithBook>> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .iter()
            .filter(|r| r.requester_id == requester_id)
            .map(|r| RequestWithBook {
                request: r.clone(),
                book_title: String::new(),
                book_author: String::new(),
            })
            .collect())
    }

    async fn list_by_donor(&self, donor_id: Uuid) -> PortResult<Vec<RequestWithBook>> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .iter()
            .filter(|r| r.donor_id == donor_id)
            .map(|r| RequestWithBook {
                request: r.clone(),
                book_title: String::new(),
                book_author: String::new(),
            })
            .collect())
    }
}

//=========================================================================================
// Contact exchanges
//=========================================================================================

#[derive(Default)]
pub struct MemoryContacts {
    pub exchanges: Mutex<Vec<ContactExchange>>,
}

#[async_trait]
impl ContactExchangeStore for MemoryContacts {
    async fn get_by_request(&self, request_id: Uuid) -> PortResult<Option<ContactExchange>> {
        let exchanges = self.exchanges.lock().unwrap();
        Ok(exchanges.iter().find(|e| e.request_id == request_id).cloned())
    }

    async fn list_by_requests(&self, request_ids: &[Uuid]) -> PortResult<Vec<ContactExchange>> {
        let exchanges = self.exchanges.lock().unwrap();
        Ok(exchanges
            .iter()
            .filter(|e| request_ids.contains(&e.request_id))
            .cloned()
            .collect())
    }

    async fn upsert_party(
        &self,
        request_id: Uuid,
        party: RequestParty,
        details: &ContactDetails,
    ) -> PortResult<ContactExchange> {
        let mut exchanges = self.exchanges.lock().unwrap();
        let exchange = match exchanges.iter_mut().find(|e| e.request_id == request_id) {
            Some(existing) => existing,
            None => {
                exchanges.push(ContactExchange {
                    id: Uuid::new_v4(),
                    request_id,
                    donor_phone: None,
                    donor_address: None,
                    requester_phone: None,
                    requester_address: None,
                    updated_at: Utc::now(),
                });
                exchanges.last_mut().expect("just pushed")
            }
        };
        match party {
            RequestParty::Donor => {
                exchange.donor_phone = Some(details.phone.clone());
                exchange.donor_address = Some(details.address.clone());
            }
            RequestParty::Requester => {
                exchange.requester_phone = Some(details.phone.clone());
                exchange.requester_address = Some(details.address.clone());
            }
        }
        exchange.updated_at = Utc::now();
        Ok(exchange.clone())
    }
}

//=========================================================================================
// Notification outbox
//=========================================================================================

#[derive(Default)]
pub struct MemoryOutbox {
    pub notifications: Mutex<Vec<Notification>>,
    /// When set, every push fails, as an unreachable outbox would.
    pub fail: AtomicBool,
}

impl MemoryOutbox {
    pub fn for_user(&self, user_id: Uuid) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationOutbox for MemoryOutbox {
    async fn push(&self, notification: NewNotification) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("outbox unavailable".to_string()));
        }
        self.notifications.lock().unwrap().push(Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind.as_str().to_string(),
            title: notification.title,
            message: notification.message,
            read: false,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> PortResult<Vec<Notification>> {
        let mut matches = self.for_user(user_id);
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> PortResult<()> {
        let mut notifications = self.notifications.lock().unwrap();
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Notification {} not found", notification_id))
            })?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> PortResult<u64> {
        let mut notifications = self.notifications.lock().unwrap();
        let mut flipped = 0;
        for notification in notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            notification.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }
}
