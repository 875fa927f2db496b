//! Drinks POS Engine
//!
//! The engine behind a small venue's point of sale: a catalog of drinks, user accounts with prepaid balances, and
//! purchases settled in cash, by card on a card reader, or from the balance.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`traits`] and [`sqlite`]). The engine APIs only talk to the storage traits; [`SqliteDatabase`] is the
//!    implementation that ships with the engine. The record types live in [`db_types`].
//! 2. The engine public API ([`mod@pos_api`]). Settlement, webhook reconciliation, card reader management, catalog
//!    and user management, and the notification hub for live client updates.
//! 3. The payment terminal boundary ([`traits::PaymentTerminal`]). The engine is provider-agnostic; the server plugs
//!    in a concrete provider.
//!
//! The engine also emits events that server-side code can hook into (see [`events`]), e.g. to write an audit log
//! whenever a purchase is settled.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod pos_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use pos_api::{
    catalog_api::CatalogApi,
    errors::{CatalogApiError, ReaderApiError, ReconcileError, SettlementError, UserApiError},
    notifications::{Notification, NotificationHub, Subscription, TransactionUpdate},
    purchase_objects::{ItemRef, PurchaseRequest},
    reader_api::{LinkOutcome, ReaderApi},
    reconcile_api::{ReconcileApi, ReconcileOutcome},
    settlement_api::SettlementApi,
    user_api::UserApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
