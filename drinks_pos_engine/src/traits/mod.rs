//! # Backend contracts
//!
//! The engine APIs are generic over these traits, so that storage backends and the card terminal provider can be
//! swapped out (or mocked) without touching the settlement logic.
//!
//! * [`CatalogManagement`] stores the items on sale.
//! * [`UserManagement`] stores user accounts, their flags and their balance.
//! * [`PurchaseManagement`] persists settled purchases, including the atomic balance movements that go with them,
//!   and the status transitions driven by the provider webhook.
//! * [`ReaderManagement`] keeps the local mirror of the provider's card readers.
//! * [`PaymentTerminal`] is the boundary to the card terminal provider.
mod catalog_management;
mod data_objects;
mod payment_terminal;
mod purchase_management;
mod reader_management;
mod user_management;

pub use catalog_management::{CatalogError, CatalogManagement};
pub use data_objects::{BalanceDebit, CheckoutRequest};
pub use payment_terminal::{PaymentTerminal, TerminalError};
pub use purchase_management::{PurchaseManagement, PurchaseManagementError};
pub use reader_management::{ReaderManagement, ReaderManagementError};
pub use user_management::{UserManagement, UserManagementError};

/// Everything purchase settlement needs from storage.
pub trait SettlementStore: CatalogManagement + PurchaseManagement {}

impl<T: CatalogManagement + PurchaseManagement> SettlementStore for T {}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
