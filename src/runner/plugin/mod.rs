//! Embedder-facing configuration and host hooks.
//!
//! - **[`EngineConfig`]**: TOML configuration read once when a [`Vm`](crate::runner::vm::Vm)
//!   is built.
//! - **[`HostHooks`]**: the slots through which a host replaces job scheduling,
//!   module loading, `import.meta` population and a few policy checks.

pub mod config;
pub mod hooks;

pub use config::{ConfigError, EngineConfig};
pub use hooks::{HandledByHost, HostHooks};
