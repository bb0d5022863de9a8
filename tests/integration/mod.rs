//! Integration test suite for piri-lifecycle
//!
//! End-to-end tests driving the orchestrators through their public API with
//! in-memory fakes for the network, the node and systemd, plus CLI tests
//! against the built `piri` binary. Nothing here needs root, network access
//! or a running supervisor.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **common**: shared release/installation harness
//! - **update_cycle**: update scenarios (full cycle, proving defers, missing checksum, late veto)
//! - **lifecycle**: install, update, rollback and uninstall against one root
//! - **cli**: argument handling and exit codes of the binary

mod common;

mod cli;
mod lifecycle;
mod update_cycle;
