//! A thin client for the parts of the SumUp REST API that a card-reader point of sale needs: merchant lookup,
//! reader pairing and reader checkouts.
mod api;
mod config;
mod error;

pub mod data_objects;

pub use api::SumUpApi;
pub use config::{SumUpConfig, DEFAULT_SUMUP_API_URL, DEFAULT_SUMUP_TIMEOUT};
pub use error::SumUpApiError;
