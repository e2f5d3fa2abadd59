pub mod contact;
pub mod domain;
pub mod lifecycle;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use contact::{ContactError, ContactExchangeFlow};
pub use domain::{
    Book, BookCategory, BookCondition, BookFilter, BookRequest, BookStatus, ContactDetails,
    ContactExchange, ContactView, NewBook, NewNotification, Notification, NotificationKind,
    RequestDecision, RequestParty, RequestStatus, RequestWithBook, User, UserCredentials,
    AuthSession,
};
pub use lifecycle::{LifecycleError, RequestLifecycle};
pub use ports::{
    AuthStore, BookCatalog, ContactExchangeStore, NotificationOutbox, PortError, PortResult,
    RequestLedger,
};
