use thiserror::Error;
use uuid::Uuid;

use crate::db_types::{User, UserFlags, UserUpdate};

#[derive(Debug, Clone, Error)]
pub enum UserManagementError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("User {0} does not exist")]
    UserNotFound(Uuid),
    #[error("The name '{0}' is already taken")]
    DuplicateName(String),
}

impl From<sqlx::Error> for UserManagementError {
    fn from(e: sqlx::Error) -> Self {
        UserManagementError::DatabaseError(e.to_string())
    }
}

/// Storage for user accounts. Soft-deleted users are invisible to every fetch method.
///
/// Balances are deliberately absent from this trait: they only ever change as part of a purchase, see
/// [`crate::traits::PurchaseManagement::settle_purchase`].
#[allow(async_fn_in_trait)]
pub trait UserManagement {
    async fn create_user(&self, name: &str, password_hash: &str) -> Result<User, UserManagementError>;

    /// Creates the well-known guest account (nil id) if it does not exist yet, and returns it.
    async fn ensure_guest_user(&self, password_hash: &str) -> Result<User, UserManagementError>;

    async fn fetch_user(&self, id: &Uuid) -> Result<Option<User>, UserManagementError>;

    async fn fetch_user_by_name(&self, name: &str) -> Result<Option<User>, UserManagementError>;

    /// All active users, most recently used first
    async fn fetch_users(&self) -> Result<Vec<User>, UserManagementError>;

    async fn update_user(&self, id: &Uuid, update: UserUpdate) -> Result<User, UserManagementError>;

    async fn update_user_flags(&self, id: &Uuid, flags: UserFlags) -> Result<User, UserManagementError>;

    async fn soft_delete_user(&self, id: &Uuid) -> Result<(), UserManagementError>;

    /// Records that the user has just been active
    async fn touch_user(&self, id: &Uuid) -> Result<(), UserManagementError>;
}
