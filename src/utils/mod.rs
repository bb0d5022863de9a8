//! Utility modules shared by the installer and the update path.
//!
//! - [`fs`] - atomic writes, idempotent removal, ownership
//! - [`interrupt`] - Ctrl-C observed between steps
//! - [`lock`] - advisory lock serializing lifecycle operations
//! - [`progress`] - spinners and download bars for interactive commands

pub mod fs;
pub mod interrupt;
pub mod lock;
pub mod progress;

pub use fs::{atomic_write, ensure_dir};
pub use interrupt::Interrupt;
pub use lock::OperationLock;
pub use progress::{ProgressBar, ProgressStyle};
