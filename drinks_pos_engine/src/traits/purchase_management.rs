use thiserror::Error;
use uuid::Uuid;

use crate::{
    db_types::{MinorUnits, NewPurchase, Purchase, TransactionStatus},
    traits::BalanceDebit,
};

#[derive(Debug, Clone, Error)]
pub enum PurchaseManagementError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("User {0} does not exist")]
    UserNotFound(Uuid),
    #[error("User {0} is restricted")]
    UserRestricted(Uuid),
    #[error("Not enough balance. Balance: {balance}, cost: {cost}")]
    InsufficientBalance { balance: MinorUnits, cost: MinorUnits },
    #[error("Could not serialize purchase items: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for PurchaseManagementError {
    fn from(e: sqlx::Error) -> Self {
        PurchaseManagementError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait PurchaseManagement {
    /// Writes a settled purchase, and the balance movements that belong to it, in a single atomic transaction.
    ///
    /// * If `debit` is given, the user's balance is reduced by `debit.amount`, but only if the user exists, is not
    ///   restricted, and is either trusted or has at least `debit.amount` available. The check and the write are a
    ///   single conditional update, so concurrent purchases by the same user cannot both spend the same funds.
    /// * The purchase record is inserted.
    /// * If `credit` is given, the purchase creator's balance is increased by that amount. Restricted users cannot be
    ///   credited.
    ///
    /// If any step fails, nothing is written.
    async fn settle_purchase(
        &self,
        purchase: NewPurchase,
        debit: Option<BalanceDebit>,
        credit: Option<MinorUnits>,
    ) -> Result<Purchase, PurchaseManagementError>;

    async fn fetch_purchase(&self, id: &Uuid) -> Result<Option<Purchase>, PurchaseManagementError>;

    /// The purchases created by `user_id`, newest first. `limit` caps the number of results.
    async fn fetch_purchases_for_user(
        &self,
        user_id: &Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Purchase>, PurchaseManagementError>;

    async fn fetch_purchase_by_transaction_ref(
        &self,
        client_transaction_id: &str,
    ) -> Result<Option<Purchase>, PurchaseManagementError>;

    /// Compare-and-set on the transaction status of the purchase carrying `client_transaction_id`.
    ///
    /// The status is only changed if it currently equals `expected`. Returns the updated purchase, or `None` if no
    /// purchase matched (either the reference is unknown, or someone else changed the status first).
    async fn update_transaction_status(
        &self,
        client_transaction_id: &str,
        expected: TransactionStatus,
        new_status: TransactionStatus,
    ) -> Result<Option<Purchase>, PurchaseManagementError>;
}
