use std::fmt;
use std::rc::Rc;

use crate::parser::ast::FunctionKind;
use crate::runner::ds::error::ThrowCompletionOr;
use crate::runner::ds::execution_context::ScriptOrModule;
use crate::runner::ds::heap::{CellId, CellVisitor};
use crate::runner::ds::value::JsValue;
use crate::runner::executor::Executable;
use crate::runner::vm::Vm;

/// Host-implemented behaviour. Receives `this`, the arguments and the values the
/// function was created with (see [`FunctionData::captures`]).
pub type NativeFunction =
    Rc<dyn Fn(&mut Vm, JsValue, &[JsValue], &[JsValue]) -> ThrowCompletionOr<JsValue>>;

#[derive(Clone)]
pub enum FunctionBehaviour {
    Native(NativeFunction),
    Compiled(Rc<Executable>),
}

impl fmt::Debug for FunctionBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBehaviour::Native(_) => write!(f, "Native"),
            FunctionBehaviour::Compiled(e) => write!(f, "Compiled({})", e.name),
        }
    }
}

pub struct FunctionData {
    pub name: String,
    pub kind: FunctionKind,
    pub behaviour: FunctionBehaviour,
    /// Closure environment for compiled functions.
    pub environment: Option<CellId>,
    pub realm: Option<CellId>,
    pub script_or_module: ScriptOrModule,
    pub is_strict: bool,
    /// Arrow functions take `this` from their defining environment.
    pub is_arrow: bool,
    /// Values a native function closes over. They are traced like any other edge,
    /// which closures captured inside an `Rc<dyn Fn>` never are.
    pub captures: Vec<JsValue>,
}

impl FunctionData {
    pub fn native(name: &str, behaviour: NativeFunction, realm: Option<CellId>) -> Self {
        FunctionData {
            name: name.to_string(),
            kind: FunctionKind::Normal,
            behaviour: FunctionBehaviour::Native(behaviour),
            environment: None,
            realm,
            script_or_module: ScriptOrModule::Empty,
            is_strict: true,
            is_arrow: false,
            captures: Vec::new(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.behaviour, FunctionBehaviour::Native(_))
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        if let Some(env) = self.environment {
            visitor.visit(env);
        }
        if let Some(realm) = self.realm {
            visitor.visit(realm);
        }
        for value in &self.captures {
            visitor.visit_value(value);
        }
        if let FunctionBehaviour::Compiled(executable) = &self.behaviour {
            executable.visit_edges(visitor);
        }
    }
}
