use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, PurchaseSettledEvent, TransactionUpdatedEvent};

type BoxedHook<E> = dyn (Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub purchase_settled_producer: Vec<EventProducer<PurchaseSettledEvent>>,
    pub transaction_updated_producer: Vec<EventProducer<TransactionUpdatedEvent>>,
}

impl EventProducers {
    pub async fn publish_purchase_settled(&self, event: PurchaseSettledEvent) {
        for emitter in &self.purchase_settled_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_transaction_updated(&self, event: TransactionUpdatedEvent) {
        for emitter in &self.transaction_updated_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_purchase_settled: Option<EventHandler<PurchaseSettledEvent>>,
    pub on_transaction_updated: Option<EventHandler<TransactionUpdatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_purchase_settled =
            hooks.on_purchase_settled.map(|f| EventHandler::new("purchase_settled", buffer_size, f));
        let on_transaction_updated =
            hooks.on_transaction_updated.map(|f| EventHandler::new("transaction_updated", buffer_size, f));
        Self { on_purchase_settled, on_transaction_updated }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_purchase_settled {
            result.purchase_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_transaction_updated {
            result.transaction_updated_producer.push(handler.subscribe());
        }
        result
    }

    pub fn start_handlers(self) {
        if let Some(handler) = self.on_purchase_settled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_transaction_updated {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_purchase_settled: Option<Handler<PurchaseSettledEvent>>,
    pub on_transaction_updated: Option<Handler<TransactionUpdatedEvent>>,
}

impl EventHooks {
    pub fn on_purchase_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        let hook: Arc<BoxedHook<PurchaseSettledEvent>> = Arc::new(f);
        self.on_purchase_settled = Some(hook);
        self
    }

    pub fn on_transaction_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TransactionUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        let hook: Arc<BoxedHook<TransactionUpdatedEvent>> = Arc::new(f);
        self.on_transaction_updated = Some(hook);
        self
    }
}
