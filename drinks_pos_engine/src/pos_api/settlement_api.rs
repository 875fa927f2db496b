//! Purchase settlement.
//!
//! [`SettlementApi::settle`] turns a [`PurchaseRequest`] from a verified [`Identity`] into a stored [`Purchase`]:
//!
//! 1. The request is validated. Contradictory or incomplete requests, and unsupported payment types, are rejected
//!    before anything else happens.
//! 2. In item mode, every item is resolved against the catalog and snapshotted. Unknown items become a zero-priced
//!    placeholder, unless strict item lookup is enabled, in which case the request fails.
//! 3. Card payments start a checkout on the requested reader. This is the only call to the outside world, and it is
//!    made before anything is written.
//! 4. The purchase, the balance debit (balance payments) and the top-up credit (amount mode) are written in a single
//!    storage transaction. The debit is conditional on the stored user record, so two concurrent purchases can never
//!    spend the same funds.
use std::{collections::HashMap, fmt::Debug};

use log::*;
use uuid::Uuid;

use crate::{
    db_types::{Identity, MinorUnits, NewPurchase, PaymentType, Purchase, PurchaseItem, TransactionStatus},
    events::{EventProducers, PurchaseSettledEvent},
    pos_api::{errors::SettlementError, purchase_objects::PurchaseRequest},
    traits::{BalanceDebit, CatalogManagement, CheckoutRequest, PaymentTerminal, PurchaseManagement},
};

pub const UNKNOWN_ITEM_NAME: &str = "No item found";

/// Balance payments at or above this cost are refused.
pub const MAX_BALANCE_COST: i64 = i32::MAX as i64;
/// Top-ups above this amount are refused.
pub const MAX_TOP_UP_AMOUNT: i64 = i32::MAX as i64;

pub struct SettlementApi<B, T> {
    db: B,
    terminal: T,
    producers: EventProducers,
    strict_items: bool,
}

impl<B, T> Debug for SettlementApi<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi (strict_items: {})", self.strict_items)
    }
}

/// What is being paid for
enum PurchaseMode {
    Items(Vec<Uuid>),
    TopUp(MinorUnits),
}

impl<B, T> SettlementApi<B, T> {
    pub fn new(db: B, terminal: T, producers: EventProducers) -> Self {
        Self { db, terminal, producers, strict_items: false }
    }

    /// When set, requests naming an item that is not in the catalog fail with `ItemNotFound` instead of being
    /// charged a zero-priced placeholder.
    pub fn with_strict_items(mut self, strict: bool) -> Self {
        self.strict_items = strict;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, T> SettlementApi<B, T>
where
    B: CatalogManagement + PurchaseManagement,
    T: PaymentTerminal,
{
    pub async fn settle(&self, identity: &Identity, request: PurchaseRequest) -> Result<Purchase, SettlementError> {
        let payment_type = parse_payment_type(&request.payment_type)?;
        let mode = purchase_mode(&request)?;
        if let PurchaseMode::TopUp(_) = mode {
            check_top_up_allowed(identity)?;
        }
        if payment_type == PaymentType::Balance && identity.restricted {
            return Err(SettlementError::Restricted(identity.user_id));
        }
        let reader_id = match payment_type {
            PaymentType::Card => Some(required_reader_id(&request)?),
            _ => None,
        };

        let (items, final_cost, refund_amount) = match &mode {
            PurchaseMode::Items(ids) => {
                let items = self.snapshot_items(ids).await?;
                let cost = total_cost(&items)?;
                (items, cost, None)
            },
            PurchaseMode::TopUp(amount) => (Vec::new(), MinorUnits::ZERO, Some(*amount)),
        };

        let mut debit = None;
        let mut client_transaction_id = None;
        let status = match payment_type {
            PaymentType::Cash => TransactionStatus::Successful,
            PaymentType::Balance => {
                if final_cost.value() >= MAX_BALANCE_COST {
                    return Err(SettlementError::InvalidRequest("final cost exceeds maximum allowed value".into()));
                }
                debit = Some(BalanceDebit { user_id: identity.user_id, amount: final_cost });
                TransactionStatus::Successful
            },
            PaymentType::Card => {
                let Some(reader_id) = reader_id.as_deref() else {
                    return Err(SettlementError::InvalidRequest("card payments require a reader_id".into()));
                };
                let amount = refund_amount.unwrap_or(final_cost);
                if !amount.is_positive() {
                    return Err(SettlementError::InvalidRequest("card payments need a positive amount".into()));
                }
                let request = CheckoutRequest { amount, description: checkout_description(&items, refund_amount) };
                let reference = self.terminal.start_checkout(reader_id, request).await.map_err(|e| {
                    warn!("🛒️ Could not start a checkout of {amount} on reader {reader_id}. {e}");
                    SettlementError::from(e)
                })?;
                debug!("🛒️ Checkout {reference} started on reader {reader_id} for {amount}");
                client_transaction_id = Some(reference);
                TransactionStatus::Pending
            },
            PaymentType::Other => {
                return Err(SettlementError::InvalidRequest("unsupported payment type 'other'".into()));
            },
        };

        let new_purchase = NewPurchase {
            items,
            payment_type,
            status,
            client_transaction_id,
            final_cost,
            refund_amount,
            created_by: identity.user_id,
        };
        let purchase = match self.db.settle_purchase(new_purchase, debit, refund_amount).await {
            Ok(p) => p,
            Err(e) => {
                if let Some(reader_id) = &reader_id {
                    self.abandon_checkout(reader_id).await;
                }
                return Err(e.into());
            },
        };
        info!(
            "🛒️ Purchase {} by {} settled. {} payment of {} is {}",
            purchase.id, identity.display_name, purchase.payment_type, purchase.final_cost, purchase.status
        );
        self.producers.publish_purchase_settled(PurchaseSettledEvent::new(purchase.clone())).await;
        Ok(purchase)
    }

    /// The caller's own purchases, newest first.
    pub async fn purchases_for(&self, identity: &Identity, limit: Option<u32>) -> Result<Vec<Purchase>, SettlementError> {
        Ok(self.db.fetch_purchases_for_user(&identity.user_id, limit).await?)
    }

    /// Fetches one of the caller's own purchases. Other users' purchases are reported as not found.
    pub async fn purchase_for(&self, identity: &Identity, id: &Uuid) -> Result<Purchase, SettlementError> {
        match self.db.fetch_purchase(id).await? {
            Some(p) if p.created_by == identity.user_id => Ok(p),
            _ => Err(SettlementError::PurchaseNotFound(*id)),
        }
    }

    async fn snapshot_items(&self, ids: &[Uuid]) -> Result<Vec<PurchaseItem>, SettlementError> {
        let found = self.db.fetch_items_by_ids(ids).await?;
        let catalog = found.iter().map(|item| (item.id, item)).collect::<HashMap<_, _>>();
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match catalog.get(id) {
                Some(item) => items.push(PurchaseItem::from(*item)),
                None if self.strict_items => return Err(SettlementError::ItemNotFound(*id)),
                None => {
                    warn!("🛒️ Item {id} is not in the catalog. It will be charged at zero");
                    items.push(PurchaseItem { id: *id, name: UNKNOWN_ITEM_NAME.to_string(), price: MinorUnits::ZERO });
                },
            }
        }
        Ok(items)
    }

    async fn abandon_checkout(&self, reader_id: &str) {
        warn!("🛒️ The purchase could not be stored. Terminating the checkout on reader {reader_id}");
        if let Err(e) = self.terminal.terminate_checkout(reader_id).await {
            error!("🛒️ Could not terminate the checkout on reader {reader_id}. {e}");
        }
    }
}

fn parse_payment_type(s: &str) -> Result<PaymentType, SettlementError> {
    match s.parse::<PaymentType>() {
        Ok(PaymentType::Other) | Err(_) => Err(SettlementError::InvalidRequest(format!("unsupported payment type '{s}'"))),
        Ok(p) => Ok(p),
    }
}

fn purchase_mode(request: &PurchaseRequest) -> Result<PurchaseMode, SettlementError> {
    match (request.item_ids(), request.amount) {
        (Some(_), Some(_)) => Err(SettlementError::InvalidRequest("provide either items or an amount, not both".into())),
        (None, None) => Err(SettlementError::InvalidRequest("provide either items or an amount".into())),
        (Some(ids), None) => Ok(PurchaseMode::Items(ids)),
        (None, Some(amount)) if amount <= 0 => Err(SettlementError::InvalidRequest("amount must be positive".into())),
        (None, Some(amount)) if amount > MAX_TOP_UP_AMOUNT => {
            Err(SettlementError::InvalidRequest("amount exceeds maximum allowed value".into()))
        },
        (None, Some(amount)) => Ok(PurchaseMode::TopUp(MinorUnits::from(amount))),
    }
}

fn check_top_up_allowed(identity: &Identity) -> Result<(), SettlementError> {
    if identity.restricted {
        return Err(SettlementError::Forbidden("restricted users cannot top up their balance".into()));
    }
    if identity.is_guest() {
        return Err(SettlementError::Forbidden("the guest account cannot hold a balance".into()));
    }
    Ok(())
}

fn required_reader_id(request: &PurchaseRequest) -> Result<String, SettlementError> {
    match request.reader_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(SettlementError::InvalidRequest("card payments require a reader_id".into())),
    }
}

fn total_cost(items: &[PurchaseItem]) -> Result<MinorUnits, SettlementError> {
    items
        .iter()
        .try_fold(MinorUnits::ZERO, |total, item| total.checked_add(item.price))
        .ok_or_else(|| SettlementError::InvalidRequest("final cost exceeds maximum allowed value".into()))
}

fn checkout_description(items: &[PurchaseItem], top_up: Option<MinorUnits>) -> String {
    match top_up {
        Some(amount) => format!("Balance top-up of {amount}"),
        None => items.iter().map(|i| i.name.as_str()).collect::<Vec<_>>().join(", "),
    }
}
