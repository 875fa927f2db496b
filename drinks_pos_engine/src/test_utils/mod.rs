//! Helpers for engine and server tests. Enabled with the `test_utils` feature.
pub mod mock_terminal;
pub mod prepare_env;
