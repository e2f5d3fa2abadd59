//! crates/bridgebook_core/src/lifecycle.rs
//!
//! The request lifecycle controller. A request starts `pending` and is
//! decided exactly once by the donor (`approved` or `rejected`); every
//! transition drops notifications into the recipients' outboxes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    BookRequest, BookStatus, NewNotification, NotificationKind, RequestDecision, RequestStatus,
};
use crate::ports::{BookCatalog, NotificationOutbox, PortError, RequestLedger};

//=========================================================================================
// Errors
//=========================================================================================

/// Failures of the request lifecycle, mapped to user-facing conditions
/// by the caller.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("A pending request for this book already exists")]
    DuplicateRequest,
    #[error("You cannot request a book you listed yourself")]
    OwnBook,
    #[error("This request has already been decided")]
    AlreadyDecided,
    #[error("A response to this request is already being processed")]
    InFlight,
    #[error("Only the donor of a request may respond to it")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(PortError),
}

impl From<PortError> for LifecycleError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

//=========================================================================================
// In-flight guard
//=========================================================================================

/// Membership in the controller's in-flight set, held for the duration of
/// a respond call. Dropping the guard releases the request id on every
/// exit path, early returns and `?` included.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    id: Uuid,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<Uuid>>, id: Uuid) -> Option<Self> {
        let mut held = set.lock().unwrap_or_else(PoisonError::into_inner);
        if held.insert(id) {
            Some(Self { set, id })
        } else {
            None
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.id);
    }
}

//=========================================================================================
// The controller
//=========================================================================================

pub struct RequestLifecycle {
    catalog: Arc<dyn BookCatalog>,
    ledger: Arc<dyn RequestLedger>,
    outbox: Arc<dyn NotificationOutbox>,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl RequestLifecycle {
    pub fn new(
        catalog: Arc<dyn BookCatalog>,
        ledger: Arc<dyn RequestLedger>,
        outbox: Arc<dyn NotificationOutbox>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            outbox,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Creates a pending request from `requester_id` for `book_id`.
    ///
    /// At most one pending request may exist per (book, requester). The
    /// friendly pre-check catches the common case; the ledger's uniqueness
    /// rule catches the race between check and insert, and both surface as
    /// `DuplicateRequest`.
    pub async fn create(
        &self,
        requester_id: Uuid,
        book_id: Uuid,
    ) -> Result<BookRequest, LifecycleError> {
        let book = self.catalog.get_book(book_id).await?;
        if book.donor_id == requester_id {
            return Err(LifecycleError::OwnBook);
        }
        if book.status != BookStatus::Available {
            return Err(LifecycleError::Validation(
                "this book is no longer available".to_string(),
            ));
        }
        if self
            .ledger
            .find_pending(book_id, requester_id)
            .await?
            .is_some()
        {
            return Err(LifecycleError::DuplicateRequest);
        }

        let message = format!(
            "Hi! I would like to borrow \"{}\" by {}.",
            book.title, book.author
        );
        let request = self
            .ledger
            .insert_request(book_id, requester_id, book.donor_id, &message)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => LifecycleError::DuplicateRequest,
                other => other.into(),
            })?;

        notify_best_effort(
            self.outbox.as_ref(),
            NewNotification {
                user_id: book.donor_id,
                kind: NotificationKind::BookRequest,
                title: "New Book Request".to_string(),
                message: format!("Someone has requested \"{}\" by {}.", book.title, book.author),
            },
        )
        .await;
        notify_best_effort(
            self.outbox.as_ref(),
            NewNotification {
                user_id: requester_id,
                kind: NotificationKind::RequestSent,
                title: "Request Sent".to_string(),
                message: format!("Your request for \"{}\" was sent to the donor.", book.title),
            },
        )
        .await;

        Ok(request)
    }

    /// Applies the donor's decision to a pending request.
    ///
    /// The in-flight set suppresses re-entrant responds for the same
    /// request inside this process; the authoritative at-most-once guard
    /// is the ledger's conditional update, which only succeeds while the
    /// row is still pending.
    pub async fn respond(
        &self,
        donor_id: Uuid,
        request_id: Uuid,
        decision: RequestDecision,
    ) -> Result<BookRequest, LifecycleError> {
        let _guard =
            InFlightGuard::acquire(&self.in_flight, request_id).ok_or(LifecycleError::InFlight)?;

        let request = self.ledger.get_request(request_id).await?;
        if request.donor_id != donor_id {
            return Err(LifecycleError::Forbidden);
        }
        if request.status != RequestStatus::Pending {
            return Err(LifecycleError::AlreadyDecided);
        }
        if !self.ledger.decide_request(request_id, decision).await? {
            // Lost the race against another decision.
            return Err(LifecycleError::AlreadyDecided);
        }

        if decision == RequestDecision::Approved {
            if let Err(e) = self
                .catalog
                .set_book_status(request.book_id, BookStatus::Unavailable)
                .await
            {
                warn!(
                    book_id = %request.book_id,
                    error = %e,
                    "failed to mark approved book unavailable"
                );
            }
        }

        let (title, message) = match decision {
            RequestDecision::Approved => (
                "Book Request Approved",
                "Your book request was approved. You can now exchange contact details.",
            ),
            RequestDecision::Rejected => (
                "Book Request Rejected",
                "Your book request was rejected by the donor.",
            ),
        };
        notify_best_effort(
            self.outbox.as_ref(),
            NewNotification {
                user_id: request.requester_id,
                kind: NotificationKind::RequestResponse,
                title: title.to_string(),
                message: message.to_string(),
            },
        )
        .await;
        notify_best_effort(
            self.outbox.as_ref(),
            NewNotification {
                user_id: donor_id,
                kind: NotificationKind::RequestResponse,
                title: "Response Sent".to_string(),
                message: "Your response was sent to the requester.".to_string(),
            },
        )
        .await;

        self.ledger.get_request(request_id).await.map_err(Into::into)
    }
}

/// Best-effort outbox write. A lost notification is logged and swallowed;
/// it never rolls back the mutation that triggered it.
pub(crate) async fn notify_best_effort(outbox: &dyn NotificationOutbox, n: NewNotification) {
    let (user_id, kind) = (n.user_id, n.kind);
    if let Err(e) = outbox.push(n).await {
        warn!(
            user_id = %user_id,
            kind = kind.as_str(),
            error = %e,
            "notification write failed"
        );
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_book, MemoryCatalog, MemoryLedger, MemoryOutbox};
    use std::sync::atomic::Ordering;

    fn controller() -> (
        Arc<MemoryCatalog>,
        Arc<MemoryLedger>,
        Arc<MemoryOutbox>,
        RequestLifecycle,
    ) {
        let catalog = Arc::new(MemoryCatalog::default());
        let ledger = Arc::new(MemoryLedger::default());
        let outbox = Arc::new(MemoryOutbox::default());
        let lifecycle = RequestLifecycle::new(catalog.clone(), ledger.clone(), outbox.clone());
        (catalog, ledger, outbox, lifecycle)
    }

    #[tokio::test]
    async fn create_inserts_pending_and_notifies_both_sides() {
        let (catalog, ledger, outbox, lifecycle) = controller();
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        catalog.seed(book.clone());

        let request = lifecycle.create(requester, book.id).await.expect("create");

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.donor_id, donor);
        assert!(request.message.contains("Dune"));
        assert!(request.message.contains("Frank Herbert"));
        assert_eq!(ledger.requests.lock().unwrap().len(), 1);

        let donor_inbox = outbox.for_user(donor);
        assert_eq!(donor_inbox.len(), 1);
        assert_eq!(donor_inbox[0].kind, "book_request");
        assert_eq!(donor_inbox[0].title, "New Book Request");

        let requester_inbox = outbox.for_user(requester);
        assert_eq!(requester_inbox.len(), 1);
        assert_eq!(requester_inbox[0].kind, "request_sent");
    }

    #[tokio::test]
    async fn create_rejects_second_pending_request() {
        let (catalog, ledger, outbox, lifecycle) = controller();
        let requester = Uuid::new_v4();
        let book = sample_book(Uuid::new_v4(), "Dune", "Frank Herbert");
        catalog.seed(book.clone());

        lifecycle.create(requester, book.id).await.expect("first create");
        let notifications_before = outbox.notifications.lock().unwrap().len();

        let err = lifecycle.create(requester, book.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateRequest));
        assert_eq!(ledger.requests.lock().unwrap().len(), 1);
        assert_eq!(outbox.notifications.lock().unwrap().len(), notifications_before);
    }

    #[tokio::test]
    async fn create_maps_insert_conflict_to_duplicate() {
        // Two concurrent creates can both pass the pre-check; the loser of
        // the insert race must still come back as DuplicateRequest.
        let (catalog, ledger, _outbox, lifecycle) = controller();
        let book = sample_book(Uuid::new_v4(), "Dune", "Frank Herbert");
        catalog.seed(book.clone());
        ledger.conflict_on_insert.store(true, Ordering::SeqCst);

        let err = lifecycle.create(Uuid::new_v4(), book.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateRequest));
    }

    #[tokio::test]
    async fn create_rejects_own_book() {
        let (catalog, _ledger, _outbox, lifecycle) = controller();
        let donor = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        catalog.seed(book.clone());

        let err = lifecycle.create(donor, book.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::OwnBook));
    }

    #[tokio::test]
    async fn create_rejects_unavailable_book() {
        let (catalog, _ledger, _outbox, lifecycle) = controller();
        let mut book = sample_book(Uuid::new_v4(), "Dune", "Frank Herbert");
        book.status = BookStatus::Unavailable;
        catalog.seed(book.clone());

        let err = lifecycle.create(Uuid::new_v4(), book.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn respond_applies_only_the_first_decision() {
        let (catalog, _ledger, _outbox, lifecycle) = controller();
        let donor = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        catalog.seed(book.clone());
        let request = lifecycle.create(Uuid::new_v4(), book.id).await.expect("create");

        let approved = lifecycle
            .respond(donor, request.id, RequestDecision::Approved)
            .await
            .expect("approve");
        assert_eq!(approved.status, RequestStatus::Approved);

        let err = lifecycle
            .respond(donor, request.id, RequestDecision::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyDecided));
    }

    #[tokio::test]
    async fn respond_is_donor_only() {
        let (catalog, _ledger, _outbox, lifecycle) = controller();
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        catalog.seed(book.clone());
        let request = lifecycle.create(requester, book.id).await.expect("create");

        // Neither the requester nor a stranger may decide.
        for impostor in [requester, Uuid::new_v4()] {
            let err = lifecycle
                .respond(impostor, request.id, RequestDecision::Approved)
                .await
                .unwrap_err();
            assert!(matches!(err, LifecycleError::Forbidden));
        }
    }

    #[tokio::test]
    async fn approval_marks_book_unavailable_and_notifies_requester() {
        let (catalog, _ledger, outbox, lifecycle) = controller();
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        catalog.seed(book.clone());
        let request = lifecycle.create(requester, book.id).await.expect("create");

        lifecycle
            .respond(donor, request.id, RequestDecision::Approved)
            .await
            .expect("approve");

        let stored = catalog.get_book(book.id).await.expect("book");
        assert_eq!(stored.status, BookStatus::Unavailable);

        let requester_inbox = outbox.for_user(requester);
        assert!(requester_inbox
            .iter()
            .any(|n| n.title == "Book Request Approved"));
    }

    #[tokio::test]
    async fn rejection_leaves_book_available() {
        let (catalog, _ledger, outbox, lifecycle) = controller();
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        catalog.seed(book.clone());
        let request = lifecycle.create(requester, book.id).await.expect("create");

        lifecycle
            .respond(donor, request.id, RequestDecision::Rejected)
            .await
            .expect("reject");

        let stored = catalog.get_book(book.id).await.expect("book");
        assert_eq!(stored.status, BookStatus::Available);
        assert!(outbox
            .for_user(requester)
            .iter()
            .any(|n| n.title == "Book Request Rejected"));
    }

    #[tokio::test]
    async fn notification_failure_never_blocks_the_request() {
        let (catalog, ledger, outbox, lifecycle) = controller();
        let book = sample_book(Uuid::new_v4(), "Dune", "Frank Herbert");
        catalog.seed(book.clone());
        outbox.fail.store(true, Ordering::SeqCst);

        let request = lifecycle
            .create(Uuid::new_v4(), book.id)
            .await
            .expect("create survives outbox failure");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(ledger.requests.lock().unwrap().len(), 1);
        assert!(outbox.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_all_read_touches_only_the_given_user() {
        let (_catalog, _ledger, outbox, _lifecycle) = controller();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for user in [alice, alice, bob] {
            notify_best_effort(
                outbox.as_ref(),
                NewNotification {
                    user_id: user,
                    kind: NotificationKind::BookRequest,
                    title: "New Book Request".to_string(),
                    message: String::new(),
                },
            )
            .await;
        }

        let flipped = outbox.mark_all_read(alice).await.expect("mark all");
        assert_eq!(flipped, 2);
        assert!(outbox.for_user(alice).iter().all(|n| n.read));
        assert!(outbox.for_user(bob).iter().all(|n| !n.read));

        // Already-read rows do not flip again.
        assert_eq!(outbox.mark_all_read(alice).await.expect("mark all"), 0);
    }

    #[test]
    fn in_flight_guard_blocks_and_releases() {
        let set = Mutex::new(HashSet::new());
        let id = Uuid::new_v4();

        let guard = InFlightGuard::acquire(&set, id).expect("first acquire");
        assert!(InFlightGuard::acquire(&set, id).is_none());
        drop(guard);
        assert!(InFlightGuard::acquire(&set, id).is_some());
    }
}
