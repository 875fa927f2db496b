use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    db_types::{Item, ItemUpdate, NewItem, DEFAULT_IMAGE},
    traits::{is_unique_violation, CatalogError},
};

pub async fn insert_item(item: NewItem, conn: &mut SqliteConnection) -> Result<Item, CatalogError> {
    let now = Utc::now();
    let image = item.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string());
    let result = sqlx::query_as(
        r#"
            INSERT INTO items (id, name, image, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&item.name)
    .bind(image)
    .bind(item.price)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(item) => Ok(item),
        Err(e) if is_unique_violation(&e) => Err(CatalogError::DuplicateName(item.name)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_item(id: &Uuid, conn: &mut SqliteConnection) -> Result<Option<Item>, CatalogError> {
    let item = sqlx::query_as("SELECT * FROM items WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(item)
}

pub async fn fetch_items(conn: &mut SqliteConnection) -> Result<Vec<Item>, CatalogError> {
    let items = sqlx::query_as("SELECT * FROM items ORDER BY name").fetch_all(conn).await?;
    Ok(items)
}

pub async fn fetch_items_by_ids(ids: &[Uuid], conn: &mut SqliteConnection) -> Result<Vec<Item>, CatalogError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM items WHERE id IN (");
    {
        let mut list = builder.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
    }
    builder.push(")");
    trace!("🗃️ Fetching {} items by id", ids.len());
    let items = builder.build_query_as::<Item>().fetch_all(conn).await?;
    Ok(items)
}

pub async fn update_item(id: &Uuid, update: ItemUpdate, conn: &mut SqliteConnection) -> Result<Item, CatalogError> {
    let name = update.name.clone();
    let result = sqlx::query_as(
        r#"
            UPDATE items SET
                name = COALESCE($1, name),
                image = COALESCE($2, image),
                price = COALESCE($3, price),
                updated_at = $4
            WHERE id = $5
            RETURNING *;
        "#,
    )
    .bind(update.name)
    .bind(update.image)
    .bind(update.price)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await;
    match result {
        Ok(Some(item)) => Ok(item),
        Ok(None) => Err(CatalogError::ItemNotFound(*id)),
        Err(e) if is_unique_violation(&e) => Err(CatalogError::DuplicateName(name.unwrap_or_default())),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_item(id: &Uuid, conn: &mut SqliteConnection) -> Result<(), CatalogError> {
    let result = sqlx::query("DELETE FROM items WHERE id = $1").bind(id).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::ItemNotFound(*id));
    }
    Ok(())
}
