//! A scripted, in-memory [`PaymentTerminal`].
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;

use crate::{
    db_types::{Reader, ReaderStatus},
    traits::{CheckoutRequest, PaymentTerminal, TerminalError},
};

#[derive(Debug, Default)]
struct MockTerminalState {
    readers: Vec<Reader>,
    checkouts: Vec<(String, CheckoutRequest)>,
    terminated: Vec<String>,
    status_script: VecDeque<Result<ReaderStatus, TerminalError>>,
    checkout_failure: Option<TerminalError>,
    counter: u64,
}

/// Clones share state, so a test can keep a handle while the API under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTerminal {
    state: Arc<Mutex<MockTerminalState>>,
}

pub fn mock_reader(id: &str, name: &str, status: ReaderStatus) -> Reader {
    let now = Utc::now();
    Reader {
        id: id.to_string(),
        name: name.to_string(),
        status,
        device_identifier: format!("dev-{id}"),
        device_model: "solo".to_string(),
        created_at: now,
        updated_at: now,
    }
}

impl MockTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readers(readers: Vec<Reader>) -> Self {
        let terminal = Self::default();
        terminal.state().readers = readers;
        terminal
    }

    fn state(&self) -> MutexGuard<'_, MockTerminalState> {
        self.state.lock().expect("mock terminal state poisoned")
    }

    /// The next `start_checkout` call fails with `err`
    pub fn fail_next_checkout(&self, err: TerminalError) {
        self.state().checkout_failure = Some(err);
    }

    /// Queues the answers to subsequent `reader_status` calls. Once the script runs out, the status of the stored
    /// reader is reported.
    pub fn script_reader_status<I>(&self, script: I)
    where I: IntoIterator<Item = Result<ReaderStatus, TerminalError>> {
        self.state().status_script.extend(script);
    }

    pub fn checkouts(&self) -> Vec<(String, CheckoutRequest)> {
        self.state().checkouts.clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        self.state().terminated.clone()
    }

    pub fn readers(&self) -> Vec<Reader> {
        self.state().readers.clone()
    }
}

impl PaymentTerminal for MockTerminal {
    async fn start_checkout(&self, reader_id: &str, request: CheckoutRequest) -> Result<String, TerminalError> {
        let mut state = self.state();
        if let Some(err) = state.checkout_failure.take() {
            return Err(err);
        }
        state.counter += 1;
        let reference = format!("mock-tx-{}", state.counter);
        state.checkouts.push((reader_id.to_string(), request));
        Ok(reference)
    }

    async fn terminate_checkout(&self, reader_id: &str) -> Result<(), TerminalError> {
        self.state().terminated.push(reader_id.to_string());
        Ok(())
    }

    async fn reader_status(&self, reader_id: &str) -> Result<ReaderStatus, TerminalError> {
        let mut state = self.state();
        if let Some(next) = state.status_script.pop_front() {
            return next;
        }
        state
            .readers
            .iter()
            .find(|r| r.id == reader_id)
            .map(|r| r.status)
            .ok_or_else(|| TerminalError::NotFound(reader_id.to_string()))
    }

    async fn list_readers(&self) -> Result<Vec<Reader>, TerminalError> {
        Ok(self.readers())
    }

    async fn create_reader(&self, name: &str, _pairing_code: &str) -> Result<Reader, TerminalError> {
        let mut state = self.state();
        state.counter += 1;
        let reader = mock_reader(&format!("rdr_{}", state.counter), name, ReaderStatus::Processing);
        state.readers.push(reader.clone());
        Ok(reader)
    }

    async fn delete_reader(&self, reader_id: &str) -> Result<(), TerminalError> {
        let mut state = self.state();
        let before = state.readers.len();
        state.readers.retain(|r| r.id != reader_id);
        if state.readers.len() == before {
            return Err(TerminalError::NotFound(reader_id.to_string()));
        }
        Ok(())
    }
}
