//! crates/bridgebook_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Books
//=========================================================================================

/// The shelf a listed book belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookCategory {
    Academic,
    Competitive,
    Adventure,
    Funny,
    Romance,
    Mystery,
    Biography,
    SelfHelp,
}

impl BookCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Competitive => "competitive",
            Self::Adventure => "adventure",
            Self::Funny => "funny",
            Self::Romance => "romance",
            Self::Mystery => "mystery",
            Self::Biography => "biography",
            Self::SelfHelp => "self-help",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "academic" => Some(Self::Academic),
            "competitive" => Some(Self::Competitive),
            "adventure" => Some(Self::Adventure),
            "funny" => Some(Self::Funny),
            "romance" => Some(Self::Romance),
            "mystery" => Some(Self::Mystery),
            "biography" => Some(Self::Biography),
            "self-help" => Some(Self::SelfHelp),
            _ => None,
        }
    }

    /// Parses a stored key, falling back to `Academic` for unrecognized values.
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Academic)
    }

    /// Display badge color for this category.
    pub fn badge_color(&self) -> &'static str {
        match self {
            Self::Academic => "blue",
            Self::Competitive => "purple",
            Self::Adventure => "green",
            Self::Funny => "yellow",
            Self::Romance => "pink",
            Self::Mystery => "indigo",
            Self::Biography => "orange",
            Self::SelfHelp => "teal",
        }
    }
}

/// Physical condition the donor reports for a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookCondition {
    Excellent,
    Good,
    Fair,
}

impl BookCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            _ => None,
        }
    }

    /// Parses a stored key, falling back to `Good` for unrecognized values.
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Good)
    }

    pub fn badge_color(&self) -> &'static str {
        match self {
            Self::Excellent => "green",
            Self::Good => "yellow",
            Self::Fair => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookStatus {
    Available,
    Unavailable,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

/// A book listed for donation.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub category: BookCategory,
    pub condition: BookCondition,
    pub status: BookStatus,
    pub is_free_to_read: bool,
    pub is_featured: bool,
    pub donor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Donor-supplied fields for listing a new book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub category: BookCategory,
    pub condition: BookCondition,
    pub is_free_to_read: bool,
    pub donor_id: Uuid,
}

/// Optional filters for browsing the available catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookFilter {
    pub free_to_read: Option<bool>,
    pub featured: Option<bool>,
}

//=========================================================================================
// Book requests
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// The donor's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Approved,
    Rejected,
}

impl RequestDecision {
    pub fn as_status(&self) -> RequestStatus {
        match self {
            Self::Approved => RequestStatus::Approved,
            Self::Rejected => RequestStatus::Rejected,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Which side of a request a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestParty {
    Donor,
    Requester,
}

impl RequestParty {
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Donor => Self::Requester,
            Self::Requester => Self::Donor,
        }
    }
}

/// A requester's ask to borrow a listed book.
#[derive(Debug, Clone)]
pub struct BookRequest {
    pub id: Uuid,
    pub book_id: Uuid,
    pub requester_id: Uuid,
    pub donor_id: Uuid,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookRequest {
    /// Returns the side `user_id` is on, or `None` for a third party.
    pub fn party_of(&self, user_id: Uuid) -> Option<RequestParty> {
        if user_id == self.donor_id {
            Some(RequestParty::Donor)
        } else if user_id == self.requester_id {
            Some(RequestParty::Requester)
        } else {
            None
        }
    }

    pub fn counterpart_of(&self, party: RequestParty) -> Uuid {
        match party {
            RequestParty::Donor => self.requester_id,
            RequestParty::Requester => self.donor_id,
        }
    }
}

/// A request joined with the title/author of the book it refers to,
/// as the request list views render it.
#[derive(Debug, Clone)]
pub struct RequestWithBook {
    pub request: BookRequest,
    pub book_title: String,
    pub book_author: String,
}

//=========================================================================================
// Contact exchange
//=========================================================================================

/// One party's pickup/delivery details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub phone: String,
    pub address: String,
}

/// The mutual contact record attached to an approved request.
/// Each side's fields stay null until that side shares.
#[derive(Debug, Clone)]
pub struct ContactExchange {
    pub id: Uuid,
    pub request_id: Uuid,
    pub donor_phone: Option<String>,
    pub donor_address: Option<String>,
    pub requester_phone: Option<String>,
    pub requester_address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ContactExchange {
    /// The details `party` has shared, if both of their fields are present.
    pub fn details_of(&self, party: RequestParty) -> Option<ContactDetails> {
        let (phone, address) = match party {
            RequestParty::Donor => (&self.donor_phone, &self.donor_address),
            RequestParty::Requester => (&self.requester_phone, &self.requester_address),
        };
        match (phone, address) {
            (Some(phone), Some(address)) => Some(ContactDetails {
                phone: phone.clone(),
                address: address.clone(),
            }),
            _ => None,
        }
    }
}

/// What one party sees when opening the contact panel of a request.
#[derive(Debug, Clone)]
pub struct ContactView {
    /// The counterpart's details, present only once the counterpart shared.
    pub counterpart: Option<ContactDetails>,
    /// Whether the viewer has already shared their own details.
    pub viewer_shared: bool,
}

//=========================================================================================
// Notifications
//=========================================================================================

/// The lifecycle events that produce outbox entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BookRequest,
    RequestSent,
    RequestResponse,
    ContactShared,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookRequest => "book_request",
            Self::RequestSent => "request_sent",
            Self::RequestResponse => "request_response",
            Self::ContactShared => "contact_shared",
        }
    }
}

/// A delivered outbox entry. `kind` stays a plain string on the read
/// side so unknown historical kinds still render.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// An outbox entry about to be written.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

//=========================================================================================
// Users and auth
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
