//! Registration, login and administration of user accounts.
use std::fmt::Debug;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::*;
use uuid::Uuid;

use crate::{
    db_types::{User, UserFlags, UserUpdate},
    pos_api::errors::UserApiError,
    traits::UserManagement,
};

pub struct UserApi<B> {
    db: B,
}

impl<B: Debug> Debug for UserApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserApi ({:?})", self.db)
    }
}

impl<B> UserApi<B>
where B: UserManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn register(&self, name: &str, password: &str) -> Result<User, UserApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserApiError::InvalidRequest("user name cannot be empty".into()));
        }
        let hash = hash_password(password)?;
        let user = self.db.create_user(name, &hash).await?;
        info!("🔐️ New user '{}' registered with id {}", user.name, user.id);
        Ok(user)
    }

    /// Checks the password for the named user and returns the user on success.
    ///
    /// An unknown user and a wrong password produce the same error.
    pub async fn authenticate(&self, name: &str, password: &str) -> Result<User, UserApiError> {
        let user = match self.db.fetch_user_by_name(name).await? {
            Some(user) => user,
            None => {
                debug!("🔐️ Login attempt for unknown user '{name}'");
                return Err(UserApiError::InvalidCredentials);
            },
        };
        if !verify_password(password, &user.password_hash) {
            debug!("🔐️ Wrong password for user '{name}'");
            return Err(UserApiError::InvalidCredentials);
        }
        self.db.touch_user(&user.id).await?;
        Ok(user)
    }

    pub async fn fetch_user(&self, id: &Uuid) -> Result<User, UserApiError> {
        self.db.fetch_user(id).await?.ok_or(UserApiError::UserNotFound(*id))
    }

    pub async fn fetch_users(&self) -> Result<Vec<User>, UserApiError> {
        Ok(self.db.fetch_users().await?)
    }

    pub async fn update_user(&self, id: &Uuid, update: UserUpdate) -> Result<User, UserApiError> {
        if update.is_empty() {
            return self.fetch_user(id).await;
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(UserApiError::InvalidRequest("user name cannot be empty".into()));
        }
        Ok(self.db.update_user(id, update).await?)
    }

    pub async fn update_flags(&self, id: &Uuid, flags: UserFlags) -> Result<User, UserApiError> {
        Ok(self.db.update_user_flags(id, flags).await?)
    }

    /// Soft-deletes a user. The guest account cannot be deleted.
    pub async fn delete_user(&self, id: &Uuid) -> Result<(), UserApiError> {
        if id.is_nil() {
            return Err(UserApiError::Forbidden("the guest account cannot be deleted".into()));
        }
        Ok(self.db.soft_delete_user(id).await?)
    }

    /// Makes sure the well-known guest account exists. The guest logs in with an empty password.
    pub async fn ensure_guest(&self) -> Result<User, UserApiError> {
        let hash = hash_password("")?;
        Ok(self.db.ensure_guest_user(&hash).await?)
    }
}

pub fn hash_password(password: &str) -> Result<String, UserApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| UserApiError::PasswordHashError(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!("🔐️ Stored password hash could not be parsed. {e}");
            false
        },
    }
}
