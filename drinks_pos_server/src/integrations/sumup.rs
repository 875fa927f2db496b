//! SumUp as the engine's [`PaymentTerminal`].
use drinks_pos_engine::{
    db_types::{Reader, ReaderStatus},
    traits::{CheckoutRequest, PaymentTerminal, TerminalError},
};
use log::*;
use sumup_tools::{data_objects::SumUpReader, SumUpApi, SumUpApiError};

#[derive(Clone)]
pub struct SumUpTerminal {
    api: SumUpApi,
}

impl SumUpTerminal {
    pub fn new(api: SumUpApi) -> Self {
        Self { api }
    }
}

pub fn reader_from_sumup(reader: SumUpReader) -> Reader {
    let status = reader.status.parse::<ReaderStatus>().unwrap_or_else(|_| {
        warn!("💳️ Reader {} reported an unrecognised status, '{}'", reader.id, reader.status);
        ReaderStatus::Unknown
    });
    Reader {
        id: reader.id,
        name: reader.name,
        status,
        device_identifier: reader.device.identifier,
        device_model: reader.device.model,
        created_at: reader.created_at,
        updated_at: reader.updated_at,
    }
}

/// Maps a client error for a call concerning `reader_id` onto the engine's terminal errors.
pub fn terminal_error(reader_id: &str, e: SumUpApiError) -> TerminalError {
    match e {
        SumUpApiError::RestResponseError(s) | SumUpApiError::Initialization(s) => TerminalError::Unavailable(s),
        SumUpApiError::QueryError { status: 404, .. } => TerminalError::NotFound(reader_id.to_string()),
        SumUpApiError::QueryError { status, message } => TerminalError::Rejected { status, message },
        SumUpApiError::JsonError(s) => TerminalError::InvalidResponse(s),
        SumUpApiError::MissingMerchantCode => TerminalError::InvalidResponse(e.to_string()),
    }
}

impl PaymentTerminal for SumUpTerminal {
    async fn start_checkout(&self, reader_id: &str, request: CheckoutRequest) -> Result<String, TerminalError> {
        self.api
            .start_checkout(reader_id, request.amount.value(), &request.description)
            .await
            .map_err(|e| terminal_error(reader_id, e))
    }

    async fn terminate_checkout(&self, reader_id: &str) -> Result<(), TerminalError> {
        self.api.terminate_checkout(reader_id).await.map_err(|e| terminal_error(reader_id, e))
    }

    async fn reader_status(&self, reader_id: &str) -> Result<ReaderStatus, TerminalError> {
        let reader = self.api.get_reader(reader_id).await.map_err(|e| terminal_error(reader_id, e))?;
        Ok(reader_from_sumup(reader).status)
    }

    async fn list_readers(&self) -> Result<Vec<Reader>, TerminalError> {
        let readers = self.api.list_readers().await.map_err(|e| terminal_error("", e))?;
        Ok(readers.into_iter().map(reader_from_sumup).collect())
    }

    async fn create_reader(&self, name: &str, pairing_code: &str) -> Result<Reader, TerminalError> {
        let reader = self.api.create_reader(name, pairing_code).await.map_err(|e| terminal_error(name, e))?;
        Ok(reader_from_sumup(reader))
    }

    async fn delete_reader(&self, reader_id: &str) -> Result<(), TerminalError> {
        self.api.delete_reader(reader_id).await.map_err(|e| terminal_error(reader_id, e))
    }
}
