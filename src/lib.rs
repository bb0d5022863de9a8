//! piri-lifecycle - deployment and self-update manager for the piri storage node
//!
//! Installs the node binary as a supervised systemd service, keeps it on the
//! latest published release without interrupting proof submission, and
//! removes it again, rolling back cleanly whenever a step fails.
//!
//! # Architecture Overview
//!
//! Two orchestrators sit on top of a set of small components:
//!
//! - [`installer::Installer`] - install and uninstall, with teardown on failure
//! - [`upgrade::UpdateOrchestrator`] - the gated update and rollback cycles
//!
//! Everything that reaches outside the process goes through a trait so the
//! orchestrators can be exercised without network, node or systemd:
//!
//! | Seam | Production | Purpose |
//! |------|------------|---------|
//! | [`http::Fetch`] | [`http::HttpClient`] | release index, checksums, archives |
//! | [`upgrade::StatusSource`] | [`upgrade::HttpStatusSource`] | node proving status |
//! | [`service::Supervisor`] | [`service::Systemctl`] | unit lifecycle |
//!
//! # Core Modules
//!
//! - [`cli`] - `install`, `uninstall`, `update` and the hidden `update-internal`
//! - [`config`] - lifecycle settings and the node's own configuration
//! - [`core`] - [`core::PiriError`] and user-facing error formatting
//! - [`release`] - release lookup and platform asset selection
//! - [`upgrade`] - integrity verification, extraction, safety gate, update cycle
//! - [`installer`] - installation layouts, binary placement, install/uninstall
//! - [`service`] - unit rendering and `systemctl` control
//! - [`privilege`] - write-access checks, `sudo` delegation, service accounts
//! - [`utils`] - file system helpers, operation lock, progress output
//!
//! # Managed Layout
//!
//! ```text
//! /opt/piri/
//! ├── bin/<version>/piri
//! ├── bin/current -> <version>
//! ├── etc/piri-config.toml
//! └── units/{piri.service, piri-updater.service, piri-updater.timer}
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! sudo piri install --config ./piri-config.toml --enable-auto-update
//! piri update --dry-run
//! sudo piri update --rollback
//! sudo piri uninstall
//! ```

#[cfg(not(unix))]
compile_error!("piri-lifecycle manages systemd services and only builds on Unix hosts");

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod http;
pub mod installer;
pub mod privilege;
pub mod release;
pub mod service;
pub mod upgrade;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
