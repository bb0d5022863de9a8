//! Self-update of the node binary.
//!
//! Updates are driven by [`orchestrator::UpdateOrchestrator`] either from a
//! terminal (`piri update`) or from the update timer (`piri update-internal`).
//! The node must never be interrupted while it is producing a proof, so every
//! disruptive step is gated on a fresh proving status snapshot.
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. Safety Check
//!    └── Query the node's proving status; defer if unsafe
//!
//! 2. Release Lookup
//!    ├── Fetch the release index, pick the newest stable release
//!    └── Stop if it matches the installed version
//!
//! 3. Download
//!    ├── Select the asset for this OS/arch
//!    ├── Resolve its checksum entry before downloading anything large
//!    ├── Download the archive and verify SHA-256 over the whole buffer
//!    └── Extract the piri executable
//!
//! 4. Install
//!    ├── Re-check safety
//!    ├── Managed: new versioned directory, swap the current pointer
//!    └── Standalone: back up and replace the binary in place
//!
//! 5. Restart
//!    ├── Re-check safety, restart piri.service when supervised and running
//!    └── Restore the previous pointer if the restart fails
//! ```
//!
//! # Safety Mechanisms
//!
//! ## Integrity
//! - Archives without a published checksum are never installed
//! - Verification completes before extraction begins
//!
//! ## Rollback
//! - Managed installs keep every previous version directory; `--rollback`
//!   moves the pointer back
//! - Standalone installs keep a `.backup` copy of the replaced binary
//!
//! # Module Structure
//!
//! - [`orchestrator`]: the update and rollback cycles
//! - [`safety`]: proving status query and the update-safe predicate
//! - [`verification`]: checksum resource parsing and SHA-256 verification
//! - [`archive`]: executable extraction from `.tar.gz` and `.zip` archives
//! - [`version`]: version normalization and comparison
//! - [`backup`]: standalone binary backups

pub mod archive;
pub mod backup;
pub mod orchestrator;
pub mod safety;
pub mod verification;
pub mod version;

pub use orchestrator::{RestartAction, UpdateMode, UpdateOrchestrator, UpdateOutcome};
pub use safety::{HttpStatusSource, NodeProvingStatus, SafetyVerdict, StatusSource, UnsafeReason};
