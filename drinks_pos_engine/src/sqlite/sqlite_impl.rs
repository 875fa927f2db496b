//! `SqliteDatabase` is a concrete implementation of a drinks POS engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`traits`]
//! module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use log::*;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::db::{db_url, items, new_pool, purchases, readers, users};
use crate::{
    db_types::{
        Item,
        ItemUpdate,
        MinorUnits,
        NewItem,
        NewPurchase,
        Purchase,
        Reader,
        ReaderStatus,
        TransactionStatus,
        User,
        UserFlags,
        UserUpdate,
    },
    traits::{
        BalanceDebit,
        CatalogError,
        CatalogManagement,
        PurchaseManagement,
        PurchaseManagementError,
        ReaderManagement,
        ReaderManagementError,
        UserManagement,
        UserManagementError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `DPOS_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

// Writes with a `RETURNING` clause each run in their own transaction. sqlx leaves such a statement open until the
// connection runs its next one, and until then other pooled connections still read the old row.
impl CatalogManagement for SqliteDatabase {
    async fn insert_item(&self, item: NewItem) -> Result<Item, CatalogError> {
        let mut tx = self.pool.begin().await?;
        let item = items::insert_item(item, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Item '{}' added to the catalog with id {}", item.name, item.id);
        Ok(item)
    }

    async fn fetch_item(&self, id: &Uuid) -> Result<Option<Item>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        items::fetch_item(id, &mut conn).await
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        items::fetch_items(&mut conn).await
    }

    async fn fetch_items_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Item>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        items::fetch_items_by_ids(ids, &mut conn).await
    }

    async fn update_item(&self, id: &Uuid, update: ItemUpdate) -> Result<Item, CatalogError> {
        let mut tx = self.pool.begin().await?;
        let item = items::update_item(id, update, &mut tx).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn delete_item(&self, id: &Uuid) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        items::delete_item(id, &mut conn).await?;
        debug!("🗃️ Item {id} removed from the catalog");
        Ok(())
    }
}

impl UserManagement for SqliteDatabase {
    async fn create_user(&self, name: &str, password_hash: &str) -> Result<User, UserManagementError> {
        let mut tx = self.pool.begin().await?;
        let user = users::create_user(name, password_hash, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ User '{}' created with id {}", user.name, user.id);
        Ok(user)
    }

    async fn ensure_guest_user(&self, password_hash: &str) -> Result<User, UserManagementError> {
        let mut tx = self.pool.begin().await?;
        let guest = users::ensure_guest_user(password_hash, &mut tx).await?;
        tx.commit().await?;
        Ok(guest)
    }

    async fn fetch_user(&self, id: &Uuid) -> Result<Option<User>, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(id, &mut conn).await
    }

    async fn fetch_user_by_name(&self, name: &str) -> Result<Option<User>, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_name(name, &mut conn).await
    }

    async fn fetch_users(&self) -> Result<Vec<User>, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_users(&mut conn).await
    }

    async fn update_user(&self, id: &Uuid, update: UserUpdate) -> Result<User, UserManagementError> {
        let mut tx = self.pool.begin().await?;
        let user = users::update_user(id, update, &mut tx).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn update_user_flags(&self, id: &Uuid, flags: UserFlags) -> Result<User, UserManagementError> {
        let mut tx = self.pool.begin().await?;
        let user = users::update_user_flags(id, flags, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Flags for user {id} are now trusted: {}, restricted: {}, admin: {}",
            user.is_trusted, user.is_restricted, user.is_admin
        );
        Ok(user)
    }

    async fn soft_delete_user(&self, id: &Uuid) -> Result<(), UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        users::soft_delete_user(id, &mut conn).await?;
        info!("🗃️ User {id} has been deleted");
        Ok(())
    }

    async fn touch_user(&self, id: &Uuid) -> Result<(), UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        users::touch_user(id, &mut conn).await
    }
}

impl PurchaseManagement for SqliteDatabase {
    /// Takes a new purchase, and in a single atomic transaction,
    /// * debits the paying user, if `debit` is given,
    /// * stores the purchase,
    /// * credits the purchase creator, if `credit` is given.
    ///
    /// Dropping the transaction on any error path rolls everything back.
    async fn settle_purchase(
        &self,
        purchase: NewPurchase,
        debit: Option<BalanceDebit>,
        credit: Option<MinorUnits>,
    ) -> Result<Purchase, PurchaseManagementError> {
        let creator = purchase.created_by;
        let mut tx = self.pool.begin().await?;
        if let Some(debit) = debit {
            if !users::try_debit_balance(&debit.user_id, debit.amount, &mut tx).await? {
                let err = explain_rejected_debit(&debit, &mut tx).await?;
                debug!("🗃️ Debit of {} from {} rejected: {err}", debit.amount, debit.user_id);
                return Err(err);
            }
            trace!("🗃️ {} debited from {}", debit.amount, debit.user_id);
        }
        let record = purchases::insert_purchase(purchase, &mut tx).await?;
        if let Some(amount) = credit {
            if !users::try_credit_balance(&creator, amount, &mut tx).await? {
                let err = explain_rejected_credit(&creator, &mut tx).await?;
                debug!("🗃️ Credit of {amount} to {creator} rejected: {err}");
                return Err(err);
            }
            trace!("🗃️ {amount} credited to {creator}");
        }
        tx.commit().await?;
        Ok(record)
    }

    async fn fetch_purchase(&self, id: &Uuid) -> Result<Option<Purchase>, PurchaseManagementError> {
        let mut conn = self.pool.acquire().await?;
        purchases::fetch_purchase(id, &mut conn).await
    }

    async fn fetch_purchases_for_user(
        &self,
        user_id: &Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Purchase>, PurchaseManagementError> {
        let mut conn = self.pool.acquire().await?;
        purchases::fetch_purchases_for_user(user_id, limit, &mut conn).await
    }

    async fn fetch_purchase_by_transaction_ref(
        &self,
        client_transaction_id: &str,
    ) -> Result<Option<Purchase>, PurchaseManagementError> {
        let mut conn = self.pool.acquire().await?;
        purchases::fetch_purchase_by_transaction_ref(client_transaction_id, &mut conn).await
    }

    async fn update_transaction_status(
        &self,
        client_transaction_id: &str,
        expected: TransactionStatus,
        new_status: TransactionStatus,
    ) -> Result<Option<Purchase>, PurchaseManagementError> {
        let mut tx = self.pool.begin().await?;
        let purchase =
            purchases::update_transaction_status(client_transaction_id, expected, new_status, &mut tx).await?;
        tx.commit().await?;
        Ok(purchase)
    }
}

impl ReaderManagement for SqliteDatabase {
    async fn replace_readers(&self, latest: &[Reader]) -> Result<usize, ReaderManagementError> {
        let mut tx = self.pool.begin().await?;
        let removed = readers::delete_all_readers(&mut tx).await?;
        for reader in latest {
            readers::upsert_reader(reader, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Replaced {removed} local reader(s) with {} from the provider", latest.len());
        Ok(latest.len())
    }

    async fn upsert_reader(&self, reader: &Reader) -> Result<Reader, ReaderManagementError> {
        let mut tx = self.pool.begin().await?;
        let reader = readers::upsert_reader(reader, &mut tx).await?;
        tx.commit().await?;
        Ok(reader)
    }

    async fn fetch_readers(&self) -> Result<Vec<Reader>, ReaderManagementError> {
        let mut conn = self.pool.acquire().await?;
        readers::fetch_readers(&mut conn).await
    }

    async fn fetch_reader(&self, id: &str) -> Result<Option<Reader>, ReaderManagementError> {
        let mut conn = self.pool.acquire().await?;
        readers::fetch_reader(id, &mut conn).await
    }

    async fn fetch_reader_by_name(&self, name: &str) -> Result<Option<Reader>, ReaderManagementError> {
        let mut conn = self.pool.acquire().await?;
        readers::fetch_reader_by_name(name, &mut conn).await
    }

    async fn delete_reader(&self, id: &str) -> Result<bool, ReaderManagementError> {
        let mut conn = self.pool.acquire().await?;
        readers::delete_reader(id, &mut conn).await
    }

    async fn update_reader_status(
        &self,
        id: &str,
        status: ReaderStatus,
    ) -> Result<Option<Reader>, ReaderManagementError> {
        let mut tx = self.pool.begin().await?;
        let reader = readers::update_reader_status(id, status, &mut tx).await?;
        tx.commit().await?;
        Ok(reader)
    }
}

async fn load_user_for_settlement(
    id: &Uuid,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, PurchaseManagementError> {
    users::fetch_user_including_deleted(id, conn)
        .await
        .map_err(|e| PurchaseManagementError::DatabaseError(e.to_string()))
}

async fn explain_rejected_debit(
    debit: &BalanceDebit,
    conn: &mut SqliteConnection,
) -> Result<PurchaseManagementError, PurchaseManagementError> {
    let err = match load_user_for_settlement(&debit.user_id, conn).await? {
        None => PurchaseManagementError::UserNotFound(debit.user_id),
        Some(user) if user.is_deleted() => PurchaseManagementError::UserNotFound(debit.user_id),
        Some(user) if user.is_restricted => PurchaseManagementError::UserRestricted(debit.user_id),
        Some(user) => PurchaseManagementError::InsufficientBalance { balance: user.balance, cost: debit.amount },
    };
    Ok(err)
}

async fn explain_rejected_credit(
    id: &Uuid,
    conn: &mut SqliteConnection,
) -> Result<PurchaseManagementError, PurchaseManagementError> {
    let err = match load_user_for_settlement(id, conn).await? {
        Some(user) if !user.is_deleted() && user.is_restricted => PurchaseManagementError::UserRestricted(*id),
        _ => PurchaseManagementError::UserNotFound(*id),
    };
    Ok(err)
}
