//! Stateless pub-sub plumbing for engine hooks.
//!
//! Every hook gets its own bounded mpsc channel. Producers are cheap clones handed to the engine APIs. The handler
//! loop spawns one task per event, so a slow hook never blocks the request that produced the event (it only applies
//! back-pressure once the channel buffer is full).
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { name, listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight hook tasks to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting {} event handler", self.name);
        // Drop our own sender, otherwise the channel never closes
        drop(self.sender);
        let tracker = TaskTracker::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling {} event", self.name);
            let handler = Arc::clone(&self.handler);
            tracker.spawn(async move {
                (handler)(ev).await;
            });
        }
        tracker.close();
        if !tracker.is_empty() {
            debug!("📬️ Waiting for {} {} hook(s) to complete", tracker.len(), self.name);
        }
        tracker.wait().await;
        debug!("📬️ {} event handler has shut down", self.name);
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
