//! Card reader lifecycle: startup sync, linking (with readiness polling), checkout termination and unlinking.
//!
//! The local reader table is a cache of what the terminal provider knows. It is replaced wholesale by
//! [`ReaderApi::sync_readers`] and kept up to date opportunistically whenever a reader's status is probed.
use std::{fmt::Debug, sync::Mutex};

use chrono::Utc;
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::{Reader, ReaderSelector, ReaderStatus},
    helpers::{poll_until_ready, PollOutcome, Probe, RetryPolicy},
    pos_api::errors::ReaderApiError,
    traits::{PaymentTerminal, ReaderManagement, TerminalError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub reader: Reader,
    /// The number of status probes it took for the reader to report ready
    pub attempts: u32,
}

pub struct ReaderApi<B, T> {
    db: B,
    terminal: T,
    policy: RetryPolicy,
}

impl<B, T> Debug for ReaderApi<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReaderApi ({:?})", self.policy)
    }
}

impl<B, T> ReaderApi<B, T> {
    pub fn new(db: B, terminal: T) -> Self {
        Self { db, terminal, policy: RetryPolicy::default() }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<B, T> ReaderApi<B, T>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    /// Replaces the local reader cache with the provider's list. Returns the number of readers now cached.
    pub async fn sync_readers(&self) -> Result<usize, ReaderApiError> {
        let readers = self.terminal.list_readers().await?;
        let count = self.db.replace_readers(&readers).await?;
        info!("💳️ Synced {count} reader(s) from the payment terminal provider");
        Ok(count)
    }

    /// Registers a new reader with the provider, then waits for it to report ready.
    ///
    /// The reader is cached locally with its last known status whether or not it became ready. Running out of
    /// attempts is reported as [`ReaderApiError::ReaderNotReady`]; the reader stays linked and can be checked again
    /// later with [`Self::check_reader`].
    pub async fn link_reader(
        &self,
        name: &str,
        pairing_code: &str,
        cancel: &CancellationToken,
    ) -> Result<LinkOutcome, ReaderApiError> {
        if pairing_code.trim().is_empty() {
            return Err(ReaderApiError::InvalidRequest("missing pairing code".into()));
        }
        if name.trim().is_empty() {
            return Err(ReaderApiError::InvalidRequest("missing reader name".into()));
        }
        let mut reader = self.terminal.create_reader(name, pairing_code).await?;
        info!("💳️ Reader '{}' created at the provider with id {}. Waiting for it to become ready", reader.name, reader.id);

        let last_seen = Mutex::new(reader.status);
        let terminal = &self.terminal;
        let id = reader.id.as_str();
        let last_seen_ref = &last_seen;
        let outcome = poll_until_ready(&self.policy, cancel, move |_| async move {
            match terminal.reader_status(id).await {
                Ok(status) => {
                    if let Ok(mut last) = last_seen_ref.lock() {
                        *last = status;
                    }
                    if status.is_ready() {
                        Probe::Ready(status)
                    } else {
                        Probe::NotReady
                    }
                },
                Err(e) if e.is_transient() => Probe::Transient(e),
                Err(e) => Probe::Fatal(e),
            }
        })
        .await;
        let last_status = last_seen.lock().map(|s| *s).unwrap_or(ReaderStatus::Unknown);

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                reader.status = value;
                let reader = self.cache_reader(reader).await?;
                info!("💳️ Reader {} is ready after {attempts} attempt(s)", reader.id);
                Ok(LinkOutcome { reader, attempts })
            },
            PollOutcome::Exhausted { attempts, last_error } => {
                reader.status = last_status;
                let reader = self.cache_reader(reader).await?;
                match last_error {
                    Some(e) => warn!("💳️ Reader {} is still {} after {attempts} attempts. {e}", reader.id, reader.status),
                    None => warn!("💳️ Reader {} is still {} after {attempts} attempts", reader.id, reader.status),
                }
                Err(ReaderApiError::ReaderNotReady { reader_id: reader.id, attempts })
            },
            PollOutcome::Failed(e) => {
                reader.status = last_status;
                let reader = self.cache_reader(reader).await?;
                error!(
                    "💳️ Could not check the status of new reader {}. It is cached as {}. {e}",
                    reader.id, reader.status
                );
                Err(e.into())
            },
            PollOutcome::Cancelled => {
                reader.status = last_status;
                let reader = self.cache_reader(reader).await?;
                info!("💳️ Stopped waiting for reader {}", reader.id);
                Err(ReaderApiError::Cancelled(reader.id))
            },
        }
    }

    /// Asks the provider for the reader's current status and records it locally.
    pub async fn check_reader(&self, id: &str) -> Result<Reader, ReaderApiError> {
        let status = self.terminal.reader_status(id).await?;
        debug!("💳️ Reader {id} reports {status}");
        self.db.update_reader_status(id, status).await?.ok_or_else(|| ReaderApiError::ReaderNotFound(id.to_string()))
    }

    /// Cancels whatever checkout is currently running on the reader.
    pub async fn terminate_checkout(&self, selector: &ReaderSelector) -> Result<String, ReaderApiError> {
        let id = self.resolve(selector).await?;
        self.terminal.terminate_checkout(&id).await?;
        info!("💳️ Checkout on reader {id} terminated");
        Ok(id)
    }

    /// Removes the reader from the provider and from the local cache.
    ///
    /// A reader that the provider no longer knows about is still removed locally.
    pub async fn unlink_reader(&self, selector: &ReaderSelector) -> Result<String, ReaderApiError> {
        let id = self.resolve(selector).await?;
        let at_provider = match self.terminal.delete_reader(&id).await {
            Ok(()) => true,
            Err(TerminalError::NotFound(_)) => {
                warn!("💳️ Reader {id} is unknown to the provider. Removing the local copy only");
                false
            },
            Err(e) => return Err(e.into()),
        };
        let locally = self.db.delete_reader(&id).await?;
        if !at_provider && !locally {
            return Err(ReaderApiError::ReaderNotFound(id));
        }
        info!("💳️ Reader {id} unlinked");
        Ok(id)
    }

    pub async fn fetch_readers(&self) -> Result<Vec<Reader>, ReaderApiError> {
        Ok(self.db.fetch_readers().await?)
    }

    pub async fn fetch_reader(&self, id: &str) -> Result<Reader, ReaderApiError> {
        self.db.fetch_reader(id).await?.ok_or_else(|| ReaderApiError::ReaderNotFound(id.to_string()))
    }

    /// The readers as the provider currently sees them, bypassing the local cache.
    pub async fn provider_readers(&self) -> Result<Vec<Reader>, ReaderApiError> {
        Ok(self.terminal.list_readers().await?)
    }

    /// Resolves a selector to a reader id. An explicit id wins; a name is looked up in the local cache.
    async fn resolve(&self, selector: &ReaderSelector) -> Result<String, ReaderApiError> {
        if let Some(id) = selector.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(id.to_string());
        }
        match selector.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => self
                .db
                .fetch_reader_by_name(name)
                .await?
                .map(|r| r.id)
                .ok_or_else(|| ReaderApiError::ReaderNotFound(name.to_string())),
            None => Err(ReaderApiError::InvalidRequest("a reader id or name is required".into())),
        }
    }

    async fn cache_reader(&self, mut reader: Reader) -> Result<Reader, ReaderApiError> {
        reader.updated_at = Utc::now();
        Ok(self.db.upsert_reader(&reader).await?)
    }
}
