use thiserror::Error;

use crate::db_types::{Reader, ReaderStatus};

#[derive(Debug, Clone, Error)]
pub enum ReaderManagementError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Reader {0} does not exist")]
    ReaderNotFound(String),
}

impl From<sqlx::Error> for ReaderManagementError {
    fn from(e: sqlx::Error) -> Self {
        ReaderManagementError::DatabaseError(e.to_string())
    }
}

/// The local mirror of the card readers registered with the terminal provider.
#[allow(async_fn_in_trait)]
pub trait ReaderManagement {
    /// Replaces every locally known reader with `readers` in one transaction. Returns the number of readers stored.
    async fn replace_readers(&self, readers: &[Reader]) -> Result<usize, ReaderManagementError>;

    async fn upsert_reader(&self, reader: &Reader) -> Result<Reader, ReaderManagementError>;

    async fn fetch_readers(&self) -> Result<Vec<Reader>, ReaderManagementError>;

    async fn fetch_reader(&self, id: &str) -> Result<Option<Reader>, ReaderManagementError>;

    async fn fetch_reader_by_name(&self, name: &str) -> Result<Option<Reader>, ReaderManagementError>;

    /// Returns true if a reader was deleted
    async fn delete_reader(&self, id: &str) -> Result<bool, ReaderManagementError>;

    async fn update_reader_status(
        &self,
        id: &str,
        status: ReaderStatus,
    ) -> Result<Option<Reader>, ReaderManagementError>;
}
