use thiserror::Error;

#[derive(Debug, Error)]
pub enum SumUpApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the SumUp API: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The SumUp account has no merchant code")]
    MissingMerchantCode,
}

impl SumUpApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SumUpApiError::QueryError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
