use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::{
    db_types::{MinorUnits, User, UserFlags, UserUpdate, DEFAULT_IMAGE, GUEST_NAME},
    traits::{is_unique_violation, UserManagementError},
};

pub async fn create_user(
    name: &str,
    password_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<User, UserManagementError> {
    insert_user(Uuid::new_v4(), name, password_hash, conn).await
}

async fn insert_user(
    id: Uuid,
    name: &str,
    password_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<User, UserManagementError> {
    let now = Utc::now();
    let result = sqlx::query_as(
        r#"
            INSERT INTO users (id, name, image, password_hash, created_at, used_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(DEFAULT_IMAGE)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(user) => Ok(user),
        Err(e) if is_unique_violation(&e) => Err(UserManagementError::DuplicateName(name.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub async fn ensure_guest_user(password_hash: &str, conn: &mut SqliteConnection) -> Result<User, UserManagementError> {
    let guest = Uuid::nil();
    if let Some(user) = fetch_user_including_deleted(&guest, conn).await? {
        return Ok(user);
    }
    info!("🗃️ Creating the guest account");
    insert_user(guest, GUEST_NAME, password_hash, conn).await
}

pub async fn fetch_user(id: &Uuid, conn: &mut SqliteConnection) -> Result<Option<User>, UserManagementError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

pub async fn fetch_user_including_deleted(
    id: &Uuid,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, UserManagementError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn fetch_user_by_name(name: &str, conn: &mut SqliteConnection) -> Result<Option<User>, UserManagementError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE name = $1 AND deleted_at IS NULL")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

pub async fn fetch_users(conn: &mut SqliteConnection) -> Result<Vec<User>, UserManagementError> {
    let users =
        sqlx::query_as("SELECT * FROM users WHERE deleted_at IS NULL ORDER BY used_at DESC").fetch_all(conn).await?;
    Ok(users)
}

pub async fn update_user(
    id: &Uuid,
    update: UserUpdate,
    conn: &mut SqliteConnection,
) -> Result<User, UserManagementError> {
    let name = update.name.clone();
    let result = sqlx::query_as(
        r#"
            UPDATE users SET
                name = COALESCE($1, name),
                image = COALESCE($2, image)
            WHERE id = $3 AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(update.name)
    .bind(update.image)
    .bind(id)
    .fetch_optional(conn)
    .await;
    match result {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(UserManagementError::UserNotFound(*id)),
        Err(e) if is_unique_violation(&e) => Err(UserManagementError::DuplicateName(name.unwrap_or_default())),
        Err(e) => Err(e.into()),
    }
}

pub async fn update_user_flags(
    id: &Uuid,
    flags: UserFlags,
    conn: &mut SqliteConnection,
) -> Result<User, UserManagementError> {
    let user = sqlx::query_as(
        r#"
            UPDATE users SET
                is_trusted = COALESCE($1, is_trusted),
                is_restricted = COALESCE($2, is_restricted),
                is_admin = COALESCE($3, is_admin)
            WHERE id = $4 AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(flags.is_trusted)
    .bind(flags.is_restricted)
    .bind(flags.is_admin)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    user.ok_or(UserManagementError::UserNotFound(*id))
}

pub async fn soft_delete_user(id: &Uuid, conn: &mut SqliteConnection) -> Result<(), UserManagementError> {
    let result = sqlx::query("UPDATE users SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL")
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(UserManagementError::UserNotFound(*id));
    }
    Ok(())
}

pub async fn touch_user(id: &Uuid, conn: &mut SqliteConnection) -> Result<(), UserManagementError> {
    sqlx::query("UPDATE users SET used_at = $1 WHERE id = $2").bind(Utc::now()).bind(id).execute(conn).await?;
    Ok(())
}

/// Takes `amount` off the user's balance if, and only if, the user is active, not restricted, and either trusted or
/// in possession of enough funds. Check and write happen in one statement. Returns false if no row qualified.
pub async fn try_debit_balance(
    id: &Uuid,
    amount: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE users SET balance = balance - $1, used_at = $2
            WHERE id = $3
              AND deleted_at IS NULL
              AND is_restricted = 0
              AND (is_trusted = 1 OR balance >= $4);
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(id)
    .bind(amount)
    .execute(conn)
    .await?;
    trace!("🗃️ Debit of {amount} from {id} affected {} row(s)", result.rows_affected());
    Ok(result.rows_affected() == 1)
}

/// Adds `amount` to the balance of an active, unrestricted user. Returns false if no row qualified.
pub async fn try_credit_balance(
    id: &Uuid,
    amount: MinorUnits,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE users SET balance = balance + $1, used_at = $2
            WHERE id = $3 AND deleted_at IS NULL AND is_restricted = 0;
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(id)
    .execute(conn)
    .await?;
    trace!("🗃️ Credit of {amount} to {id} affected {} row(s)", result.rows_affected());
    Ok(result.rows_affected() == 1)
}
