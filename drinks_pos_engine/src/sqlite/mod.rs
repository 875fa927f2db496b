//! SQLite storage backend for the drinks POS engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
