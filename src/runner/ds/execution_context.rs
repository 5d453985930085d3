use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::parser::ast::SourceRange;
use crate::runner::ds::heap::{CellId, CellVisitor};
use crate::runner::ds::value::JsValue;
use crate::runner::executor::Executable;
use crate::runner::module::{ModuleId, ScriptId};

/// Identity of the script or module whose code a context is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptOrModule {
    Empty,
    Script(ScriptId),
    Module(ModuleId),
}

impl ScriptOrModule {
    pub fn is_empty(&self) -> bool {
        matches!(self, ScriptOrModule::Empty)
    }
}

impl Default for ScriptOrModule {
    fn default() -> Self {
        ScriptOrModule::Empty
    }
}

/// Where an executor currently is inside its code.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionCursor {
    pub offset: usize,
    pub source_range: Option<SourceRange>,
}

pub struct ExecutionContext {
    pub function: Option<CellId>,
    pub function_name: Option<String>,
    pub realm: CellId,
    pub script_or_module: ScriptOrModule,
    pub lex_env: Option<CellId>,
    pub var_env: Option<CellId>,
    pub is_strict: bool,
    pub this_value: Option<JsValue>,
    pub arguments: Vec<JsValue>,
    /// Scratch values owned by the executor while this context runs.
    pub registers: Vec<JsValue>,
    pub executable: Option<Rc<Executable>>,
    /// Last known position; refreshed whenever another context is pushed on top.
    pub cursor: Option<InstructionCursor>,
}

impl ExecutionContext {
    pub fn new(realm: CellId) -> Self {
        ExecutionContext {
            function: None,
            function_name: None,
            realm,
            script_or_module: ScriptOrModule::Empty,
            lex_env: None,
            var_env: None,
            is_strict: false,
            this_value: None,
            arguments: Vec::new(),
            registers: Vec::new(),
            executable: None,
            cursor: None,
        }
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        if let Some(function) = self.function {
            visitor.visit(function);
        }
        visitor.visit(self.realm);
        if let Some(env) = self.lex_env {
            visitor.visit(env);
        }
        if let Some(env) = self.var_env {
            visitor.visit(env);
        }
        if let Some(this) = &self.this_value {
            visitor.visit_value(this);
        }
        for value in self.arguments.iter().chain(self.registers.iter()) {
            visitor.visit_value(value);
        }
        if let Some(executable) = &self.executable {
            executable.visit_edges(visitor);
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("function_name", &self.function_name)
            .field("script_or_module", &self.script_or_module)
            .field("lex_env", &self.lex_env)
            .field("is_strict", &self.is_strict)
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// The live context stack plus the stacks parked aside by [`save`](Self::save).
pub struct ExecutionContextStack {
    stack: Vec<ExecutionContext>,
    saved_stacks: Vec<Vec<ExecutionContext>>,
}

impl ExecutionContextStack {
    pub fn new() -> Self {
        ExecutionContextStack {
            stack: Vec::new(),
            saved_stacks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn get_running_execution_ctx(&self) -> Option<&ExecutionContext> {
        self.stack.last()
    }

    pub fn get_running_execution_ctx_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.stack.last_mut()
    }

    /// Push `ctx`. `current_cursor` is the executor's position in the context
    /// being suspended, recorded so diagnostics stay accurate once it resumes.
    pub fn push_execution_ctx(&mut self, ctx: ExecutionContext, current_cursor: Option<InstructionCursor>) {
        if let Some(top) = self.stack.last_mut() {
            if current_cursor.is_some() {
                top.cursor = current_cursor;
            }
        }
        self.stack.push(ctx)
    }

    pub fn pop_running_execution_ctx(&mut self) -> Option<ExecutionContext> {
        self.stack.pop()
    }

    pub fn save(&mut self) {
        self.saved_stacks.push(mem::take(&mut self.stack));
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn restore(&mut self) {
        assert!(
            self.stack.is_empty(),
            "restoring a saved execution context stack over {} live contexts",
            self.stack.len()
        );
        self.stack = self
            .saved_stacks
            .pop()
            .expect("restore without a matching save");
    }

    pub fn saved_stack_count(&self) -> usize {
        self.saved_stacks.len()
    }

    pub fn contexts(&self) -> &[ExecutionContext] {
        &self.stack
    }

    pub fn saved_stacks(&self) -> &[Vec<ExecutionContext>] {
        &self.saved_stacks
    }

    /// The innermost script or module identity. Frames above the bottom one win
    /// only when non-empty; the bottom frame's identity is the fallback.
    pub fn get_active_script_or_module(&self) -> ScriptOrModule {
        if self.stack.is_empty() {
            return ScriptOrModule::Empty;
        }
        for ctx in self.stack[1..].iter().rev() {
            if !ctx.script_or_module.is_empty() {
                return ctx.script_or_module;
            }
        }
        self.stack[0].script_or_module
    }
}

impl Default for ExecutionContextStack {
    fn default() -> Self {
        Self::new()
    }
}
