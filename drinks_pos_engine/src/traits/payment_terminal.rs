use thiserror::Error;

use crate::{
    db_types::{Reader, ReaderStatus},
    traits::CheckoutRequest,
};

#[derive(Debug, Clone, Error)]
pub enum TerminalError {
    #[error("The payment terminal provider could not be reached. {0}")]
    Unavailable(String),
    #[error("The payment terminal provider rejected the request ({status}). {message}")]
    Rejected { status: u16, message: String },
    #[error("Reader {0} is not known to the payment terminal provider")]
    NotFound(String),
    #[error("Unexpected response from the payment terminal provider. {0}")]
    InvalidResponse(String),
}

impl TerminalError {
    /// True for failures that may well go away on their own (network trouble, provider overload)
    pub fn is_transient(&self) -> bool {
        match self {
            TerminalError::Unavailable(_) => true,
            TerminalError::Rejected { status, .. } => *status == 429 || *status >= 500,
            TerminalError::NotFound(_) | TerminalError::InvalidResponse(_) => false,
        }
    }
}

/// The card terminal provider, as seen by the engine.
///
/// Implementations are expected to apply their own request timeouts, so that every call here returns in bounded
/// time. Currency and the checkout return URL are implementation configuration.
#[allow(async_fn_in_trait)]
pub trait PaymentTerminal {
    /// Asks the reader to collect `request.amount` from the customer. Returns the provider's transaction reference,
    /// which the provider will quote in its webhook callbacks.
    async fn start_checkout(&self, reader_id: &str, request: CheckoutRequest) -> Result<String, TerminalError>;

    async fn terminate_checkout(&self, reader_id: &str) -> Result<(), TerminalError>;

    async fn reader_status(&self, reader_id: &str) -> Result<ReaderStatus, TerminalError>;

    async fn list_readers(&self) -> Result<Vec<Reader>, TerminalError>;

    async fn create_reader(&self, name: &str, pairing_code: &str) -> Result<Reader, TerminalError>;

    async fn delete_reader(&self, reader_id: &str) -> Result<(), TerminalError>;
}
