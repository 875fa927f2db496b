//! Shared primitives for the drinks POS workspace.
mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{MinorUnits, MinorUnitsConversionError, CURRENCY_CODE, CURRENCY_MINOR_UNIT};
pub use secret::Secret;
