use crate::db_types::{Purchase, TransactionStatus};

/// Emitted after a purchase has been committed to storage, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseSettledEvent {
    pub purchase: Purchase,
}

impl PurchaseSettledEvent {
    pub fn new(purchase: Purchase) -> Self {
        Self { purchase }
    }
}

/// Emitted when the provider webhook moved a pending card purchase to a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdatedEvent {
    pub purchase: Purchase,
    pub previous_status: TransactionStatus,
}

impl TransactionUpdatedEvent {
    pub fn new(purchase: Purchase, previous_status: TransactionStatus) -> Self {
        Self { purchase, previous_status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    PurchaseSettled(PurchaseSettledEvent),
    TransactionUpdated(TransactionUpdatedEvent),
}
