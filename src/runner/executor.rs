use std::rc::Rc;

use crate::parser::ast::{FunctionKind, Node, OpaqueNode, SourceRange};
use crate::runner::ds::error::ThrowCompletionOr;
use crate::runner::ds::execution_context::InstructionCursor;
use crate::runner::ds::heap::CellVisitor;
use crate::runner::ds::value::JsValue;
use crate::runner::vm::Vm;

/// Compiled code, as produced by an [`Executor`].
pub struct Executable {
    pub name: String,
    pub kind: FunctionKind,
    pub code: OpaqueNode,
    /// Heap values the code refers to; traced while the executable is reachable.
    pub constants: Vec<JsValue>,
    pub source_range: Option<SourceRange>,
}

impl Executable {
    pub fn new(name: &str, kind: FunctionKind, code: OpaqueNode) -> Self {
        Executable {
            name: name.to_string(),
            kind,
            code,
            constants: Vec::new(),
            source_range: None,
        }
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        for value in &self.constants {
            visitor.visit_value(value);
        }
    }
}

pub struct RunResult {
    pub value: ThrowCompletionOr<JsValue>,
    /// Registers of the finished frame, when the executor keeps them.
    pub frame: Option<Vec<JsValue>>,
}

impl RunResult {
    pub fn value(value: ThrowCompletionOr<JsValue>) -> Self {
        RunResult { value, frame: None }
    }
}

/// The bytecode compiler and interpreter the engine drives.
///
/// Methods take `&self`; an executor that needs mutable state keeps it behind
/// interior mutability. The engine never holds a borrow of the executor across
/// a call back into itself.
pub trait Executor {
    fn compile(&self, vm: &mut Vm, node: &Node, kind: FunctionKind, name: &str) -> ThrowCompletionOr<Rc<Executable>>;

    /// Run `executable` in the current running execution context.
    fn run(&self, vm: &mut Vm, executable: &Executable, receiver: Option<JsValue>) -> RunResult;

    /// Where execution currently stands, if the executor tracks it.
    fn instruction_cursor(&self) -> Option<InstructionCursor> {
        None
    }
}
