use chrono::Utc;
use log::*;
use sqlx::{types::Json, SqliteConnection};
use uuid::Uuid;

use crate::{
    db_types::{NewPurchase, Purchase, TransactionStatus},
    traits::PurchaseManagementError,
};

/// Inserts a new purchase. This is not atomic with respect to any balance changes; embed it in a transaction (and
/// pass `&mut tx`) when it has to be.
pub async fn insert_purchase(
    purchase: NewPurchase,
    conn: &mut SqliteConnection,
) -> Result<Purchase, PurchaseManagementError> {
    let record: Purchase = sqlx::query_as(
        r#"
            INSERT INTO purchases (
                id,
                items,
                payment_type,
                status,
                client_transaction_id,
                final_cost,
                refund_amount,
                created_at,
                created_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(Json(&purchase.items))
    .bind(purchase.payment_type)
    .bind(purchase.status)
    .bind(purchase.client_transaction_id)
    .bind(purchase.final_cost)
    .bind(purchase.refund_amount)
    .bind(Utc::now())
    .bind(purchase.created_by)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Purchase {} saved with status {}", record.id, record.status);
    Ok(record)
}

pub async fn fetch_purchase(id: &Uuid, conn: &mut SqliteConnection) -> Result<Option<Purchase>, PurchaseManagementError> {
    let purchase = sqlx::query_as("SELECT * FROM purchases WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(purchase)
}

pub async fn fetch_purchases_for_user(
    user_id: &Uuid,
    limit: Option<u32>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Purchase>, PurchaseManagementError> {
    // A negative LIMIT means "no limit" in SQLite
    let limit = limit.map(i64::from).unwrap_or(-1);
    let purchases = sqlx::query_as(
        r#"
            SELECT * FROM purchases
            WHERE created_by = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2;
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(purchases)
}

pub async fn fetch_purchase_by_transaction_ref(
    client_transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Purchase>, PurchaseManagementError> {
    let purchase = sqlx::query_as("SELECT * FROM purchases WHERE client_transaction_id = $1")
        .bind(client_transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(purchase)
}

pub async fn update_transaction_status(
    client_transaction_id: &str,
    expected: TransactionStatus,
    new_status: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Purchase>, PurchaseManagementError> {
    let purchase = sqlx::query_as(
        r#"
            UPDATE purchases SET status = $1
            WHERE client_transaction_id = $2 AND status = $3
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(client_transaction_id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(purchase)
}
