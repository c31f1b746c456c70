//! Helpers for tests that need a real backend or control over time.
mod mock_clock;
mod prepare_env;

pub use mock_clock::MockClock;
pub use prepare_env::{create_database, drop_database, prepare_test_env, random_db_path};
