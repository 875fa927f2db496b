use thiserror::Error;
use uuid::Uuid;

use crate::{
    db_types::TransactionStatus,
    traits::{
        CatalogError,
        PurchaseManagementError,
        ReaderManagementError,
        TerminalError,
        UserManagementError,
    },
};

#[derive(Debug, Clone, Error)]
pub enum CatalogApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Item {0} does not exist")]
    ItemNotFound(Uuid),
    #[error("An item named '{0}' already exists")]
    DuplicateName(String),
}

impl From<CatalogError> for CatalogApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DatabaseError(s) => Self::DatabaseError(s),
            CatalogError::ItemNotFound(id) => Self::ItemNotFound(id),
            CatalogError::DuplicateName(name) => Self::DuplicateName(name),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum UserApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("User {0} does not exist")]
    UserNotFound(Uuid),
    #[error("The name '{0}' is already taken")]
    UserAlreadyExists(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("Could not hash password. {0}")]
    PasswordHashError(String),
}

impl From<UserManagementError> for UserApiError {
    fn from(e: UserManagementError) -> Self {
        match e {
            UserManagementError::DatabaseError(s) => Self::DatabaseError(s),
            UserManagementError::UserNotFound(id) => Self::UserNotFound(id),
            UserManagementError::DuplicateName(name) => Self::UserAlreadyExists(name),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("User {0} is restricted")]
    Restricted(Uuid),
    #[error("User {0} does not exist")]
    UserNotFound(Uuid),
    #[error("Item {0} does not exist")]
    ItemNotFound(Uuid),
    #[error("Purchase {0} does not exist")]
    PurchaseNotFound(Uuid),
    #[error("Payment gateway error. {0}")]
    PaymentGatewayError(String),
}

impl From<CatalogError> for SettlementError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::ItemNotFound(id) => Self::ItemNotFound(id),
            other => Self::DatabaseError(other.to_string()),
        }
    }
}

impl From<PurchaseManagementError> for SettlementError {
    fn from(e: PurchaseManagementError) -> Self {
        match e {
            PurchaseManagementError::DatabaseError(s) => Self::DatabaseError(s),
            PurchaseManagementError::SerializationError(s) => Self::DatabaseError(s),
            PurchaseManagementError::UserNotFound(id) => Self::UserNotFound(id),
            PurchaseManagementError::UserRestricted(id) => Self::Restricted(id),
            PurchaseManagementError::InsufficientBalance { .. } => Self::Forbidden("not enough balance".into()),
        }
    }
}

impl From<TerminalError> for SettlementError {
    fn from(e: TerminalError) -> Self {
        Self::PaymentGatewayError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Transaction {transaction_ref} is already {current} and cannot become {requested}")]
    StatusRegression { transaction_ref: String, current: TransactionStatus, requested: TransactionStatus },
}

impl From<PurchaseManagementError> for ReconcileError {
    fn from(e: PurchaseManagementError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReaderApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Reader {0} does not exist")]
    ReaderNotFound(String),
    #[error("Reader {reader_id} did not become ready after {attempts} attempts")]
    ReaderNotReady { reader_id: String, attempts: u32 },
    #[error("The operation on reader {0} was cancelled")]
    Cancelled(String),
    #[error("Payment gateway error. {0}")]
    PaymentGatewayError(String),
}

impl From<ReaderManagementError> for ReaderApiError {
    fn from(e: ReaderManagementError) -> Self {
        match e {
            ReaderManagementError::DatabaseError(s) => Self::DatabaseError(s),
            ReaderManagementError::ReaderNotFound(id) => Self::ReaderNotFound(id),
        }
    }
}

impl From<TerminalError> for ReaderApiError {
    fn from(e: TerminalError) -> Self {
        match e {
            TerminalError::NotFound(id) => Self::ReaderNotFound(id),
            other => Self::PaymentGatewayError(other.to_string()),
        }
    }
}
