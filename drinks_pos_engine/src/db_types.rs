//! Record types shared between the storage backends, the engine APIs and the HTTP layer.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use dpos_common::MinorUnits;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_IMAGE: &str = "assets/empty.webp";
pub const GUEST_NAME: &str = "Guest";

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        Item         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub price: MinorUnits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: MinorUnits,
}

impl NewItem {
    pub fn new<S: Into<String>>(name: S, price: MinorUnits) -> Self {
        Self { name: name.into(), image: None, price }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
    pub price: Option<MinorUnits>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.image.is_none() && self.price.is_none()
    }
}

//--------------------------------------        User         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    #[serde(skip, default)]
    pub password_hash: String,
    pub balance: MinorUnits,
    pub is_trusted: bool,
    pub is_restricted: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_guest(&self) -> bool {
        self.id.is_nil()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFlags {
    pub is_trusted: Option<bool>,
    pub is_restricted: Option<bool>,
    pub is_admin: Option<bool>,
}

//--------------------------------------      Identity       ---------------------------------------------------------
/// The verified identity of a caller, as produced by the authentication layer. Settlement trusts these flags only
/// for early rejection; the stored user record remains authoritative for balance decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub display_name: String,
    pub trusted: bool,
    pub restricted: bool,
    pub admin: bool,
}

impl Identity {
    pub fn guest() -> Self {
        Self {
            user_id: Uuid::nil(),
            display_name: GUEST_NAME.to_string(),
            trusted: false,
            restricted: false,
            admin: false,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_nil()
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            display_name: user.name.clone(),
            trusted: user.is_trusted,
            restricted: user.is_restricted,
            admin: user.is_admin,
        }
    }
}

//--------------------------------------     PaymentType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Card,
    Balance,
    Other,
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentType::Cash => write!(f, "cash"),
            PaymentType::Card => write!(f, "card"),
            PaymentType::Balance => write!(f, "balance"),
            PaymentType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for PaymentType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "balance" => Ok(Self::Balance),
            "other" => Ok(Self::Other),
            _ => Err(ConversionError(format!("Invalid payment type: {s}"))),
        }
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Successful,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Re-applying the current status is allowed (and is a no-op). Otherwise only `Pending` may move, and only to a
    /// terminal status.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        *self == next || (*self == TransactionStatus::Pending && next.is_terminal())
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::Successful => write!(f, "SUCCESSFUL"),
            TransactionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "SUCCESSFUL" => Ok(Self::Successful),
            "FAILED" | "CANCELLED" | "CANCELED" => Ok(Self::Failed),
            _ => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//--------------------------------------      Purchase       ---------------------------------------------------------
/// A snapshot of an item at the moment it was sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub id: Uuid,
    pub name: String,
    pub price: MinorUnits,
}

impl From<&Item> for PurchaseItem {
    fn from(item: &Item) -> Self {
        Self { id: item.id, name: item.name.clone(), price: item.price }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    #[sqlx(json)]
    pub items: Vec<PurchaseItem>,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_transaction_id: Option<String>,
    pub final_cost: MinorUnits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<MinorUnits>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}

/// A purchase that has been fully decided, but not yet written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    pub items: Vec<PurchaseItem>,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub client_transaction_id: Option<String>,
    pub final_cost: MinorUnits,
    pub refund_amount: Option<MinorUnits>,
    pub created_by: Uuid,
}

//--------------------------------------       Reader        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReaderStatus {
    Unknown,
    Processing,
    Paired,
    Expired,
}

impl ReaderStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReaderStatus::Paired)
    }
}

impl Display for ReaderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderStatus::Unknown => write!(f, "unknown"),
            ReaderStatus::Processing => write!(f, "processing"),
            ReaderStatus::Paired => write!(f, "paired"),
            ReaderStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for ReaderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "processing" => Ok(Self::Processing),
            "paired" => Ok(Self::Paired),
            "expired" => Ok(Self::Expired),
            _ => Err(ConversionError(format!("Invalid reader status: {s}"))),
        }
    }
}

/// A card reader, as known to the payment terminal provider and mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Reader {
    pub id: String,
    pub name: String,
    pub status: ReaderStatus,
    pub device_identifier: String,
    pub device_model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identifies a reader either by provider id or by its (locally cached) name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSelector {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
