//! The execution core: heap and value model, environments, the context
//! stack, modules, jobs and the [`Vm`](vm::Vm) façade tying them together.

pub mod ds;
pub mod eval;
pub mod executor;
pub mod jobs;
pub mod module;
pub mod plugin;
pub mod roots;
pub mod vm;

pub use vm::Vm;
