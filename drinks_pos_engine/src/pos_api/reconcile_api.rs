use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Purchase, TransactionStatus},
    events::{EventProducers, TransactionUpdatedEvent},
    pos_api::{
        errors::ReconcileError,
        notifications::{Notification, NotificationHub, TransactionUpdate},
    },
    traits::PurchaseManagement,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The purchase moved from `Pending` to a terminal status. Subscribers were notified.
    Updated(Purchase),
    /// The purchase already had the reported status.
    Unchanged(Purchase),
    /// No purchase carries the reported transaction reference.
    NoMatch,
}

/// Applies asynchronous card transaction status changes reported by the terminal provider.
pub struct ReconcileApi<B> {
    db: B,
    hub: NotificationHub,
    producers: EventProducers,
}

impl<B> Debug for ReconcileApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconcileApi ({:?})", self.hub)
    }
}

impl<B> ReconcileApi<B>
where B: PurchaseManagement
{
    pub fn new(db: B, hub: NotificationHub, producers: EventProducers) -> Self {
        Self { db, hub, producers }
    }

    /// Moves the purchase carrying `transaction_ref` to `new_status`.
    ///
    /// Only the status changes. Re-applying the current status is a no-op, and a terminal status can never be left.
    /// The write is a compare-and-set, so when two callbacks for the same transaction race, exactly one of them
    /// performs the update and notifies.
    pub async fn handle_status_change(
        &self,
        transaction_ref: &str,
        new_status: TransactionStatus,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(purchase) = self.db.fetch_purchase_by_transaction_ref(transaction_ref).await? else {
            warn!("🔄️ Status {new_status} reported for unknown transaction {transaction_ref}. Ignoring it");
            return Ok(ReconcileOutcome::NoMatch);
        };
        let current = purchase.status;
        if current == new_status {
            debug!("🔄️ Transaction {transaction_ref} is already {current}");
            return Ok(ReconcileOutcome::Unchanged(purchase));
        }
        if !current.can_transition_to(new_status) {
            return Err(regression(transaction_ref, current, new_status));
        }
        match self.db.update_transaction_status(transaction_ref, current, new_status).await? {
            Some(updated) => {
                info!("🔄️ Transaction {transaction_ref} (purchase {}) is now {new_status}", updated.id);
                self.notify(transaction_ref, &updated);
                let event = TransactionUpdatedEvent::new(updated.clone(), current);
                self.producers.publish_transaction_updated(event).await;
                Ok(ReconcileOutcome::Updated(updated))
            },
            None => {
                // Someone else changed the status between our read and our write
                let latest = self.db.fetch_purchase_by_transaction_ref(transaction_ref).await?;
                match latest {
                    Some(p) if p.status == new_status => Ok(ReconcileOutcome::Unchanged(p)),
                    Some(p) => Err(regression(transaction_ref, p.status, new_status)),
                    None => Ok(ReconcileOutcome::NoMatch),
                }
            },
        }
    }

    fn notify(&self, transaction_ref: &str, purchase: &Purchase) {
        let update = TransactionUpdate {
            client_transaction_id: transaction_ref.to_string(),
            status: purchase.status,
            purchase_id: purchase.id,
        };
        let receivers = self.hub.publish(Notification::TransactionUpdate(update));
        trace!("🔄️ Transaction update for {transaction_ref} sent to {receivers} subscriber(s)");
    }
}

fn regression(transaction_ref: &str, current: TransactionStatus, requested: TransactionStatus) -> ReconcileError {
    warn!("🔄️ Refusing to move transaction {transaction_ref} from {current} to {requested}");
    ReconcileError::StatusRegression { transaction_ref: transaction_ref.to_string(), current, requested }
}
