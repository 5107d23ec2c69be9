//! End-to-end integration tests for Loglane
//!
//! The suites under `tests/` drive the full axum router (middleware,
//! handlers, metrics) against a real SQLite database in a temporary
//! directory.
