//! # just-vm - the execution core of a JavaScript engine
//!
//! This crate owns everything between the parser and the bytecode
//! interpreter:
//! - a handle-based heap with mark/sweep collection and root enumeration
//! - lexical environments and identifier resolution with slot caching
//! - destructuring binding initialization
//! - the execution context stack, including save/restore for nested runs
//! - module loading, linking and evaluation, JSON modules included
//! - promise and finalization-registry job queues
//!
//! Parsing and code execution are supplied by the embedder through the
//! [`parser::SourceParser`] and [`runner::executor::Executor`] traits.
//! Engine policy (module loading, job scheduling, import.meta and so on)
//! can be overridden through [`runner::plugin::HostHooks`].
//!
//! ## Quick Start
//!
//! ```
//! use std::rc::Rc;
//!
//! use just_vm::parser::ast::{FunctionKind, Node, OpaqueNode, Program, ProgramKind};
//! use just_vm::parser::{ParsedModule, ParserError, SourceParser};
//! use just_vm::runner::ds::error::ThrowCompletionOr;
//! use just_vm::runner::ds::value::JsValue;
//! use just_vm::runner::executor::{Executable, Executor, RunResult};
//! use just_vm::runner::plugin::EngineConfig;
//! use just_vm::runner::Vm;
//!
//! /// Every program evaluates to 42.
//! struct Answer;
//!
//! impl Executor for Answer {
//!     fn compile(&self, _: &mut Vm, _: &Node, kind: FunctionKind, name: &str) -> ThrowCompletionOr<Rc<Executable>> {
//!         Ok(Rc::new(Executable::new(name, kind, OpaqueNode::empty())))
//!     }
//!
//!     fn run(&self, _: &mut Vm, _: &Executable, _: Option<JsValue>) -> RunResult {
//!         RunResult::value(Ok(JsValue::from_i64(42)))
//!     }
//! }
//!
//! struct Opaque;
//!
//! impl SourceParser for Opaque {
//!     fn parse_script(&self, _: &str, filename: &str) -> Result<Program, Vec<ParserError>> {
//!         Ok(Program {
//!             kind: ProgramKind::Script,
//!             is_strict: false,
//!             filename: filename.to_string(),
//!             body: OpaqueNode::empty(),
//!         })
//!     }
//!
//!     fn parse_module(&self, source: &str, filename: &str) -> Result<ParsedModule, Vec<ParserError>> {
//!         let mut program = self.parse_script(source, filename)?;
//!         program.kind = ProgramKind::Module;
//!         Ok(ParsedModule::new(program))
//!     }
//! }
//!
//! let mut vm = Vm::new(EngineConfig::default(), Rc::new(Answer), Rc::new(Opaque)).unwrap();
//! let result = vm.run_script("6 * 7", "answer.js").unwrap();
//! assert_eq!(result, JsValue::from_i64(42));
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - the AST slice the core inspects and the parser trait
//! - **[`runner`]** - the execution core
//!   - **[`runner::ds`]** - heap, values, objects, environments, contexts, realms
//!   - **[`runner::eval`]** - references and binding initialization
//!   - **[`runner::module`]** - module records, loader, linker, JSON modules
//!   - **[`runner::jobs`]** - promise and cleanup job queues
//!   - **[`runner::roots`]** - garbage collection roots
//!   - **[`runner::plugin`]** - host hooks and engine configuration
//!   - **[`runner::vm`]** - the engine façade

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;
