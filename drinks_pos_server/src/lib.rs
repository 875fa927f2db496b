//! # Drinks POS server
//! The HTTP front end of the drinks point of sale. It is responsible for:
//! * Authenticating staff and customers, and issuing session tokens.
//! * Serving the catalog, user and purchase endpoints on top of the engine APIs.
//! * Managing the SumUp card readers, and receiving the provider's checkout status callbacks.
//! * Streaming transaction updates to connected clients as server-sent events.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/auth/login`, `/auth/logout`, `/auth/refresh_token`: Session handling.
//! * `/items`, `/users`, `/purchases`, `/readers`: The REST API. See [routes](routes/index.html).
//! * `/callback`: The card provider's checkout status callback.
//! * `/events`: The live event stream.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod event_stream;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
