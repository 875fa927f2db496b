//! Process-wide, best-effort fan-out of status changes to connected clients.
//!
//! The hub is a thin wrapper around a bounded [`broadcast`] channel. Attaching is [`NotificationHub::subscribe`];
//! detaching is dropping the [`Subscription`]. There is no replay for late subscribers. A subscriber that falls more
//! than `capacity` events behind skips the oldest ones and carries on, so a slow client can never grow memory without
//! bound. Each subscriber sees events in publish order.
use futures_util::{stream, Stream};
use log::*;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::db_types::TransactionStatus;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub client_transaction_id: String,
    pub status: TransactionStatus,
    pub purchase_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    TransactionUpdate(TransactionUpdate),
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::TransactionUpdate(_) => "transaction_update",
        }
    }
}

#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationHub({} subscribers)", self.sender.receiver_count())
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> Subscription {
        let receiver = self.sender.subscribe();
        debug!("📣️ New subscriber attached. {} active", self.sender.receiver_count());
        Subscription { receiver }
    }

    /// Returns the number of subscribers the event was queued for. Having nobody listening is not an error.
    pub fn publish(&self, notification: Notification) -> usize {
        match self.sender.send(notification) {
            Ok(n) => {
                trace!("📣️ Notification queued for {n} subscriber(s)");
                n
            },
            Err(_) => {
                trace!("📣️ No subscribers. Notification dropped");
                0
            },
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<Notification>,
}

impl Subscription {
    /// Waits for the next notification. Returns `None` once the hub has been dropped.
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(n) => return Some(n),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("📣️ Slow subscriber skipped {skipped} notification(s)");
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Notification> {
        stream::unfold(self, |mut sub| async move { sub.next().await.map(|n| (n, sub)) })
    }
}
