use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db_types::MinorUnits;

/// A request to take `amount` off a user's balance as part of settling a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDebit {
    pub user_id: Uuid,
    pub amount: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub amount: MinorUnits,
    pub description: String,
}
