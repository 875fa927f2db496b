//! In-process hooks for engine events.
//!
//! These are distinct from the client-facing [`crate::NotificationHub`]: hooks run server-side code (audit logging,
//! integrations) and receive the full records, while the hub fans out slim notifications to connected clients.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
