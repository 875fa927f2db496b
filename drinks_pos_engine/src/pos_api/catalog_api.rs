use std::fmt::Debug;

use log::*;
use uuid::Uuid;

use crate::{
    db_types::{Item, ItemUpdate, NewItem},
    pos_api::errors::CatalogApiError,
    traits::CatalogManagement,
};

/// Management of the items on sale.
pub struct CatalogApi<B> {
    db: B,
}

impl<B: Debug> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi ({:?})", self.db)
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_item(&self, item: NewItem) -> Result<Item, CatalogApiError> {
        validate_name(&item.name)?;
        if item.price.is_negative() {
            return Err(CatalogApiError::InvalidRequest("price cannot be negative".into()));
        }
        let item = self.db.insert_item(item).await?;
        info!("🛒️ New item '{}' costs {}", item.name, item.price);
        Ok(item)
    }

    pub async fn fetch_item(&self, id: &Uuid) -> Result<Item, CatalogApiError> {
        self.db.fetch_item(id).await?.ok_or(CatalogApiError::ItemNotFound(*id))
    }

    pub async fn fetch_items(&self) -> Result<Vec<Item>, CatalogApiError> {
        Ok(self.db.fetch_items().await?)
    }

    /// Updates the given fields of an item. An empty update simply returns the current item.
    ///
    /// Purchases keep their own snapshot of item names and prices, so editing an item never changes history.
    pub async fn update_item(&self, id: &Uuid, update: ItemUpdate) -> Result<Item, CatalogApiError> {
        if update.is_empty() {
            return self.fetch_item(id).await;
        }
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if update.price.is_some_and(|p| p.is_negative()) {
            return Err(CatalogApiError::InvalidRequest("price cannot be negative".into()));
        }
        let item = self.db.update_item(id, update).await?;
        debug!("🛒️ Item {id} updated");
        Ok(item)
    }

    pub async fn delete_item(&self, id: &Uuid) -> Result<(), CatalogApiError> {
        self.db.delete_item(id).await?;
        info!("🛒️ Item {id} deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), CatalogApiError> {
    if name.trim().is_empty() {
        return Err(CatalogApiError::InvalidRequest("item name cannot be empty".into()));
    }
    Ok(())
}
