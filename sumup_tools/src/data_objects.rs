use chrono::{DateTime, Utc};
use dpos_common::{CURRENCY_CODE, CURRENCY_MINOR_UNIT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderDevice {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub model: String,
}

/// A card reader as reported by SumUp. `status` is one of `unknown`, `processing`, `paired` or `expired`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumUpReader {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub device: ReaderDevice,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderList {
    #[serde(default)]
    pub items: Vec<SumUpReader>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReader {
    pub pairing_code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutAmount {
    pub currency: String,
    pub minor_unit: u32,
    pub value: i64,
}

impl CheckoutAmount {
    pub fn in_minor_units(value: i64) -> Self {
        Self { currency: CURRENCY_CODE.to_string(), minor_unit: CURRENCY_MINOR_UNIT, value }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReaderCheckout {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    pub total_amount: CheckoutAmount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderCheckoutData {
    pub client_transaction_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderCheckoutResponse {
    pub data: ReaderCheckoutData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MerchantProfile {
    #[serde(default)]
    pub merchant_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MerchantAccount {
    #[serde(default)]
    pub merchant_profile: Option<MerchantProfile>,
}

/// The body of the `solo.transaction.updated` callback SumUp sends to the checkout `return_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderCheckoutStatusChange {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    pub payload: ReaderCheckoutStatusPayload,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderCheckoutStatusPayload {
    pub client_transaction_id: String,
    #[serde(default)]
    pub merchant_code: Option<String>,
    pub status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
}
