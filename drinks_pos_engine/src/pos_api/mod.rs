//! # Drinks POS engine public API
//!
//! The `pos_api` module exposes the programmatic API of the engine. Each API is a small struct, generic over the
//! storage and terminal traits it needs, that is constructed once at startup and handed to whoever needs it.
//!
//! * [`catalog_api`] manages the items on sale.
//! * [`user_api`] handles registration, login, and user administration.
//! * [`settlement_api`] settles purchases paid in cash, by card or from the user's balance, and balance top-ups.
//! * [`reconcile_api`] applies the asynchronous card transaction updates sent by the terminal provider.
//! * [`reader_api`] manages the card readers.
//! * [`notifications`] is the broadcast hub that pushes status changes to connected clients.
//!
//! # API usage
//!
//! ```rust,ignore
//! use drinks_pos_engine::{SettlementApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = SettlementApi::new(db, terminal, EventProducers::default());
//! let purchase = api.settle(&identity, request).await?;
//! ```
pub mod catalog_api;
pub mod errors;
pub mod notifications;
pub mod purchase_objects;
pub mod reader_api;
pub mod reconcile_api;
pub mod settlement_api;
pub mod user_api;
