//! Core types shared by every lifecycle component.
//!
//! - [`error`] - the [`PiriError`] taxonomy and CLI-facing [`ErrorContext`]

pub mod error;

pub use error::{ErrorContext, PiriError, user_friendly_error};
