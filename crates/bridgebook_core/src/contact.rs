//! crates/bridgebook_core/src/contact.rs
//!
//! The contact exchange flow. Once a request is approved, each party may
//! share their own phone/address, and each sees the counterpart's details
//! as soon as the counterpart has shared.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    ContactDetails, ContactExchange, ContactView, NewNotification, NotificationKind,
    RequestStatus, RequestWithBook,
};
use crate::lifecycle::notify_best_effort;
use crate::ports::{ContactExchangeStore, NotificationOutbox, PortError, RequestLedger};

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    Validation(String),
    #[error("Contact details unlock once the request is approved")]
    NotApproved,
    #[error("Only the parties of a request may use its contact exchange")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(PortError),
}

impl From<PortError> for ContactError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

pub struct ContactExchangeFlow {
    ledger: Arc<dyn RequestLedger>,
    contacts: Arc<dyn ContactExchangeStore>,
    outbox: Arc<dyn NotificationOutbox>,
}

impl ContactExchangeFlow {
    pub fn new(
        ledger: Arc<dyn RequestLedger>,
        contacts: Arc<dyn ContactExchangeStore>,
        outbox: Arc<dyn NotificationOutbox>,
    ) -> Self {
        Self {
            ledger,
            contacts,
            outbox,
        }
    }

    /// Writes the caller's own phone/address on an approved request.
    /// Re-sharing overwrites only the caller's fields, so the operation is
    /// an idempotent last-write-wins for that side.
    pub async fn share(
        &self,
        user_id: Uuid,
        request_id: Uuid,
        details: ContactDetails,
    ) -> Result<ContactExchange, ContactError> {
        // Required-field validation happens before any store round-trip.
        let phone = details.phone.trim();
        let address = details.address.trim();
        if phone.is_empty() || address.is_empty() {
            return Err(ContactError::Validation(
                "both phone and address are required".to_string(),
            ));
        }
        let details = ContactDetails {
            phone: phone.to_string(),
            address: address.to_string(),
        };

        let request = self.ledger.get_request(request_id).await?;
        let party = request.party_of(user_id).ok_or(ContactError::Forbidden)?;
        if request.status != RequestStatus::Approved {
            return Err(ContactError::NotApproved);
        }

        let exchange = self.contacts.upsert_party(request_id, party, &details).await?;

        notify_best_effort(
            self.outbox.as_ref(),
            NewNotification {
                user_id: request.counterpart_of(party),
                kind: NotificationKind::ContactShared,
                title: "Contact Details Shared".to_string(),
                message: "The other party shared their contact details for your book exchange."
                    .to_string(),
            },
        )
        .await;

        Ok(exchange)
    }

    /// What `user_id` may see of the exchange. The reveal keys strictly off
    /// the counterpart's side of the record; the viewer's own fields are
    /// never echoed back as the counterpart's.
    pub async fn view(&self, user_id: Uuid, request_id: Uuid) -> Result<ContactView, ContactError> {
        let request = self.ledger.get_request(request_id).await?;
        let party = request.party_of(user_id).ok_or(ContactError::Forbidden)?;
        if request.status != RequestStatus::Approved {
            return Err(ContactError::NotApproved);
        }

        Ok(match self.contacts.get_by_request(request_id).await? {
            None => ContactView {
                counterpart: None,
                viewer_shared: false,
            },
            Some(exchange) => ContactView {
                counterpart: exchange.details_of(party.counterpart()),
                viewer_shared: exchange.details_of(party).is_some(),
            },
        })
    }

    /// Bulk variant of [`view`](Self::view) for a request list: one store
    /// read for all approved rows `user_id` is a party to, keyed by
    /// request id. Rows that are not approved (or not the user's) are
    /// simply absent from the result.
    pub async fn views_for(
        &self,
        user_id: Uuid,
        rows: &[RequestWithBook],
    ) -> Result<HashMap<Uuid, ContactView>, ContactError> {
        let mut parties = HashMap::new();
        for row in rows {
            if row.request.status != RequestStatus::Approved {
                continue;
            }
            if let Some(party) = row.request.party_of(user_id) {
                parties.insert(row.request.id, party);
            }
        }
        if parties.is_empty() {
            return Ok(HashMap::new());
        }

        let request_ids: Vec<Uuid> = parties.keys().copied().collect();
        let exchanges = self.contacts.list_by_requests(&request_ids).await?;
        let mut by_request: HashMap<Uuid, ContactExchange> = exchanges
            .into_iter()
            .map(|e| (e.request_id, e))
            .collect();

        Ok(parties
            .into_iter()
            .map(|(request_id, party)| {
                let view = match by_request.remove(&request_id) {
                    None => ContactView {
                        counterpart: None,
                        viewer_shared: false,
                    },
                    Some(exchange) => ContactView {
                        counterpart: exchange.details_of(party.counterpart()),
                        viewer_shared: exchange.details_of(party).is_some(),
                    },
                };
                (request_id, view)
            })
            .collect())
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RequestDecision, RequestStatus};
    use crate::lifecycle::RequestLifecycle;
    use crate::test_support::{sample_book, MemoryCatalog, MemoryContacts, MemoryLedger, MemoryOutbox};

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        ledger: Arc<MemoryLedger>,
        contacts: Arc<MemoryContacts>,
        outbox: Arc<MemoryOutbox>,
        lifecycle: RequestLifecycle,
        flow: ContactExchangeFlow,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(MemoryCatalog::default());
        let ledger = Arc::new(MemoryLedger::default());
        let contacts = Arc::new(MemoryContacts::default());
        let outbox = Arc::new(MemoryOutbox::default());
        let lifecycle = RequestLifecycle::new(catalog.clone(), ledger.clone(), outbox.clone());
        let flow = ContactExchangeFlow::new(ledger.clone(), contacts.clone(), outbox.clone());
        Fixture {
            catalog,
            ledger,
            contacts,
            outbox,
            lifecycle,
            flow,
        }
    }

    fn details(phone: &str, address: &str) -> ContactDetails {
        ContactDetails {
            phone: phone.to_string(),
            address: address.to_string(),
        }
    }

    /// Creates and approves a request, returning (donor, requester, request id).
    async fn approved_request(fx: &Fixture) -> (Uuid, Uuid, Uuid) {
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        fx.catalog.seed(book.clone());
        let request = fx.lifecycle.create(requester, book.id).await.expect("create");
        fx.lifecycle
            .respond(donor, request.id, RequestDecision::Approved)
            .await
            .expect("approve");
        (donor, requester, request.id)
    }

    #[tokio::test]
    async fn share_requires_an_approved_request() {
        let fx = fixture();
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let book = sample_book(donor, "Dune", "Frank Herbert");
        fx.catalog.seed(book.clone());
        let request = fx.lifecycle.create(requester, book.id).await.expect("create");

        let err = fx
            .flow
            .share(requester, request.id, details("555-0100", "12 Oak St"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::NotApproved));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_without_a_store_round_trip() {
        let fx = fixture();
        let (_donor, requester, request_id) = approved_request(&fx).await;
        fx.ledger.reads.lock().unwrap().clear();

        for (phone, address) in [("", "12 Oak St"), ("555-0100", ""), ("  ", "  ")] {
            let err = fx
                .flow
                .share(requester, request_id, details(phone, address))
                .await
                .unwrap_err();
            assert!(matches!(err, ContactError::Validation(_)));
        }
        assert!(fx.ledger.reads.lock().unwrap().is_empty());
        assert!(fx.contacts.exchanges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn share_is_idempotent_per_party() {
        let fx = fixture();
        let (_donor, requester, request_id) = approved_request(&fx).await;

        fx.flow
            .share(requester, request_id, details("555-0100", "12 Oak St"))
            .await
            .expect("first share");
        let exchange = fx
            .flow
            .share(requester, request_id, details("555-0199", "14 Oak St"))
            .await
            .expect("second share");

        assert_eq!(fx.contacts.exchanges.lock().unwrap().len(), 1);
        assert_eq!(exchange.requester_phone.as_deref(), Some("555-0199"));
        assert_eq!(exchange.requester_address.as_deref(), Some("14 Oak St"));
        assert_eq!(exchange.donor_phone, None);
    }

    #[tokio::test]
    async fn reveal_keys_off_the_counterpart_role() {
        let fx = fixture();
        let (donor, requester, request_id) = approved_request(&fx).await;

        fx.flow
            .share(donor, request_id, details("555-0200", "9 Elm Ave"))
            .await
            .expect("donor shares");

        // The donor never sees their own details echoed back.
        let donor_view = fx.flow.view(donor, request_id).await.expect("donor view");
        assert!(donor_view.counterpart.is_none());
        assert!(donor_view.viewer_shared);

        // The requester sees them without having shared anything yet.
        let requester_view = fx
            .flow
            .view(requester, request_id)
            .await
            .expect("requester view");
        assert_eq!(
            requester_view.counterpart,
            Some(details("555-0200", "9 Elm Ave"))
        );
        assert!(!requester_view.viewer_shared);
    }

    #[tokio::test]
    async fn third_parties_are_locked_out() {
        let fx = fixture();
        let (_donor, _requester, request_id) = approved_request(&fx).await;
        let stranger = Uuid::new_v4();

        let err = fx.flow.view(stranger, request_id).await.unwrap_err();
        assert!(matches!(err, ContactError::Forbidden));
        let err = fx
            .flow
            .share(stranger, request_id, details("555-0300", "1 Side Rd"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::Forbidden));
    }

    #[tokio::test]
    async fn share_notifies_the_counterpart() {
        let fx = fixture();
        let (donor, requester, request_id) = approved_request(&fx).await;

        fx.flow
            .share(requester, request_id, details("555-0100", "12 Oak St"))
            .await
            .expect("share");

        assert!(fx
            .outbox
            .for_user(donor)
            .iter()
            .any(|n| n.kind == "contact_shared"));
        assert!(!fx
            .outbox
            .for_user(requester)
            .iter()
            .any(|n| n.kind == "contact_shared"));
    }

    #[tokio::test]
    async fn views_for_covers_only_approved_rows_of_the_viewer() {
        let fx = fixture();
        let (donor, requester, approved_id) = approved_request(&fx).await;

        // A second, still-pending request from the same requester.
        let other_book = sample_book(donor, "Emma", "Jane Austen");
        fx.catalog.seed(other_book.clone());
        let pending = fx
            .lifecycle
            .create(requester, other_book.id)
            .await
            .expect("second request");

        fx.flow
            .share(donor, approved_id, details("555-0200", "9 Elm Ave"))
            .await
            .expect("donor shares");

        let rows = fx
            .ledger
            .list_by_requester(requester)
            .await
            .expect("rows");
        let views = fx.flow.views_for(requester, &rows).await.expect("views");

        assert_eq!(views.len(), 1);
        let view = views.get(&approved_id).expect("approved row present");
        assert_eq!(view.counterpart, Some(details("555-0200", "9 Elm Ave")));
        assert!(!view.viewer_shared);
        assert!(!views.contains_key(&pending.id));

        // A stranger gets nothing back for the same rows.
        let stranger_views = fx
            .flow
            .views_for(Uuid::new_v4(), &rows)
            .await
            .expect("stranger views");
        assert!(stranger_views.is_empty());
    }

    /// Full walkthrough: list, request, approve, both parties share,
    /// both can read the other side.
    #[tokio::test]
    async fn dune_exchange_end_to_end() {
        let fx = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let dune = sample_book(alice, "Dune", "Frank Herbert");
        fx.catalog.seed(dune.clone());

        let request = fx.lifecycle.create(bob, dune.id).await.expect("request");
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(fx
            .outbox
            .for_user(alice)
            .iter()
            .any(|n| n.title == "New Book Request"));

        let approved = fx
            .lifecycle
            .respond(alice, request.id, RequestDecision::Approved)
            .await
            .expect("approve");
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(fx
            .outbox
            .for_user(bob)
            .iter()
            .any(|n| n.title == "Book Request Approved"));

        fx.flow
            .share(bob, request.id, details("555-0100", "12 Oak St"))
            .await
            .expect("bob shares");
        fx.flow
            .share(alice, request.id, details("555-0200", "9 Elm Ave"))
            .await
            .expect("alice shares");

        let alice_view = fx.flow.view(alice, request.id).await.expect("alice view");
        assert_eq!(alice_view.counterpart, Some(details("555-0100", "12 Oak St")));
        let bob_view = fx.flow.view(bob, request.id).await.expect("bob view");
        assert_eq!(bob_view.counterpart, Some(details("555-0200", "9 Elm Ave")));

        let exchanges = fx.contacts.exchanges.lock().unwrap();
        assert_eq!(exchanges.len(), 1);
        let exchange = &exchanges[0];
        assert!(exchange.donor_phone.is_some());
        assert!(exchange.donor_address.is_some());
        assert!(exchange.requester_phone.is_some());
        assert!(exchange.requester_address.is_some());
    }
}
