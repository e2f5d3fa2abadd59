//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use bridgebook_core::contact::ContactExchangeFlow;
use bridgebook_core::lifecycle::RequestLifecycle;
use bridgebook_core::ports::{AuthStore, BookCatalog, NotificationOutbox, RequestLedger};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Handlers reach the stores through the ports, and the request/contact
/// flows through their controllers, so nothing below this struct knows
/// about Postgres.
#[derive(Clone)]
pub struct AppState {
    pub books: Arc<dyn BookCatalog>,
    pub requests: Arc<dyn RequestLedger>,
    pub notifications: Arc<dyn NotificationOutbox>,
    pub auth: Arc<dyn AuthStore>,
    pub lifecycle: Arc<RequestLifecycle>,
    pub contacts: Arc<ContactExchangeFlow>,
    pub config: Arc<Config>,
}
