//! Configuration for the lifecycle manager.
//!
//! Two files matter:
//!
//! 1. **Lifecycle settings** (`/etc/piri/lifecycle.toml`, optional) - where
//!    the installation lives, where releases come from, timeouts. Loaded into
//!    [`LifecycleConfig`] together with the command-line flags of the current
//!    invocation.
//! 2. **Node configuration** (`<root>/etc/piri-config.toml`) - the node's own
//!    TOML file. Validated at install time and read back by the update path
//!    for the status endpoint and stop timeout. See [`NodeConfig`].

pub mod node;
pub mod settings;

pub use node::NodeConfig;
pub use settings::{InvocationFlags, LifecycleConfig};
