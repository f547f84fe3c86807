//! End-to-end tests for the merche client
//!
//! These tests exercise the client across calls against the in-process mock
//! API from `merche_client::testing`:
//! - every container accessor on one shared client
//! - concurrent calls from several tasks
//! - cancellation before and during a call
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p merche-tests
//! ```

// This crate only contains tests, no library code
