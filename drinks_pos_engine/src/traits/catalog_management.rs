use thiserror::Error;
use uuid::Uuid;

use crate::db_types::{Item, ItemUpdate, NewItem};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Item {0} does not exist")]
    ItemNotFound(Uuid),
    #[error("An item named '{0}' already exists")]
    DuplicateName(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_item(&self, item: NewItem) -> Result<Item, CatalogError>;

    async fn fetch_item(&self, id: &Uuid) -> Result<Option<Item>, CatalogError>;

    /// All items, ordered by name
    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError>;

    /// Fetches the items with the given ids. Unknown ids are silently left out of the result, and duplicates are
    /// only returned once; it is up to the caller to decide what a missing item means.
    async fn fetch_items_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Item>, CatalogError>;

    async fn update_item(&self, id: &Uuid, update: ItemUpdate) -> Result<Item, CatalogError>;

    async fn delete_item(&self, id: &Uuid) -> Result<(), CatalogError>;
}
