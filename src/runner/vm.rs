//! The engine façade.
//!
//! A [`Vm`] owns the heap, the execution context stack, the job queues and the
//! module cache. Code is compiled and run by an [`Executor`]; source text is
//! parsed by a [`SourceParser`]. Both are supplied by the embedder, as are any
//! [`HostHooks`] it wants to override.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;
use uuid::Uuid;

use crate::parser::ast::{Expression, FunctionKind, Node, SourceRange};
use crate::parser::SourceParser;
use crate::runner::ds::env_record::EnvironmentRecordType;
use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::execution_context::{ExecutionContext, ExecutionContextStack, ScriptOrModule};
use crate::runner::ds::function_object::{FunctionBehaviour, FunctionData, NativeFunction};
use crate::runner::ds::heap::{CellId, Heap, HeapCell};
use crate::runner::ds::object::{JsObject, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::operations::lex_env::new_function_environment;
use crate::runner::ds::operations::type_conversion::display_value;
use crate::runner::ds::realm::WellKnownIntrinsics;
use crate::runner::ds::symbol::{SymbolData, WellKnownSymbols};
use crate::runner::ds::value::JsValue;
use crate::runner::executor::{Executable, Executor};
use crate::runner::jobs::{JobQueues, JobSource};
use crate::runner::module::{ModuleId, ModuleRecord, ScriptId, ScriptRecord, StoredModule};
use crate::runner::plugin::hooks::{default_resize_array_buffer, HandledByHost};
use crate::runner::plugin::{EngineConfig, HostHooks};

lazy_static! {
    static ref SINGLE_ASCII_CHARACTER_STRINGS: Vec<String> =
        (0u8..128).map(|b| (b as char).to_string()).collect();
}

pub type CallStackEmptiedCallback = Rc<dyn Fn(&mut Vm)>;
pub type PromiseCallback = Rc<dyn Fn(&mut Vm, CellId)>;
pub type JobErrorCallback = Rc<dyn Fn(&mut Vm, JobSource, &JErrorType)>;

/// One line of a stack trace, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    pub function_name: Option<String>,
    pub source_range: Option<SourceRange>,
}

pub struct Vm {
    id: Uuid,
    pub(crate) config: EngineConfig,
    pub(crate) heap: Heap,
    pub(crate) execution_context_stack: ExecutionContextStack,
    pub(crate) job_queues: JobQueues,
    pub(crate) modules: Vec<ModuleRecord>,
    pub(crate) scripts: Vec<ScriptRecord>,
    pub(crate) stored_modules: Vec<StoredModule>,
    pub(crate) realm: Option<CellId>,
    pub(crate) empty_string: CellId,
    pub(crate) single_ascii_character_strings: Vec<CellId>,
    pub(crate) well_known_symbols: WellKnownSymbols,
    pub(crate) global_symbol_registry: HashMap<String, CellId>,
    pub host_hooks: HostHooks,
    pub(crate) executor: Rc<dyn Executor>,
    pub(crate) parser: Rc<dyn SourceParser>,
    dynamic_imports_allowed: bool,
    on_call_stack_emptied: Option<CallStackEmptiedCallback>,
    pub(crate) on_promise_unhandled_rejection: Option<PromiseCallback>,
    pub(crate) on_promise_rejection_handled: Option<PromiseCallback>,
    pub(crate) on_job_error: Option<JobErrorCallback>,
}

impl Vm {
    pub fn new(config: EngineConfig, executor: Rc<dyn Executor>, parser: Rc<dyn SourceParser>) -> ThrowCompletionOr<Vm> {
        let mut heap = Heap::new(config.heap_config());
        let empty_string = heap.allocate(HeapCell::String(String::new()))?;
        let mut single_ascii_character_strings = Vec::with_capacity(SINGLE_ASCII_CHARACTER_STRINGS.len());
        for s in SINGLE_ASCII_CHARACTER_STRINGS.iter() {
            single_ascii_character_strings.push(heap.allocate(HeapCell::String(s.clone()))?);
        }
        let well_known_symbols = WellKnownSymbols::create(&mut heap)?;

        let mut vm = Vm {
            id: Uuid::new_v4(),
            dynamic_imports_allowed: config.engine.dynamic_imports_allowed,
            config,
            heap,
            execution_context_stack: ExecutionContextStack::new(),
            job_queues: JobQueues::new(),
            modules: Vec::new(),
            scripts: Vec::new(),
            stored_modules: Vec::new(),
            realm: None,
            empty_string,
            single_ascii_character_strings,
            well_known_symbols,
            global_symbol_registry: HashMap::new(),
            host_hooks: HostHooks::default(),
            executor,
            parser,
            on_call_stack_emptied: None,
            on_promise_unhandled_rejection: None,
            on_promise_rejection_handled: None,
            on_job_error: None,
        };
        let realm = vm.create_realm()?;
        vm.realm = Some(realm);
        debug!(vm = %vm.id, "created engine");
        Ok(vm)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn dynamic_imports_allowed(&self) -> bool {
        self.dynamic_imports_allowed
    }

    pub fn enable_dynamic_imports(&mut self, allowed: bool) {
        self.dynamic_imports_allowed = allowed;
    }

    /// A string value. The empty string and single ASCII characters are
    /// shared, everything else is a fresh cell.
    pub fn js_string(&mut self, s: &str) -> ThrowCompletionOr<JsValue> {
        let bytes = s.as_bytes();
        let cell = match bytes {
            [] => self.empty_string,
            [b] if b.is_ascii() => self.single_ascii_character_strings[*b as usize],
            _ => self.heap.allocate(HeapCell::String(s.to_string()))?,
        };
        Ok(JsValue::String(cell))
    }

    pub fn string_value(&self, value: &JsValue) -> Option<&str> {
        match value {
            JsValue::String(s) => Some(self.heap.string(*s)),
            _ => None,
        }
    }

    /// `Symbol.for(key)`.
    pub fn symbol_for(&mut self, key: &str) -> ThrowCompletionOr<CellId> {
        if let Some(symbol) = self.global_symbol_registry.get(key) {
            return Ok(*symbol);
        }
        let symbol = self
            .heap
            .allocate(HeapCell::Symbol(SymbolData::new_registered(key.to_string())))?;
        self.global_symbol_registry.insert(key.to_string(), symbol);
        Ok(symbol)
    }

    pub fn new_symbol(&mut self, description: Option<&str>) -> ThrowCompletionOr<CellId> {
        self.heap
            .allocate(HeapCell::Symbol(SymbolData::new(description.map(str::to_string))))
    }

    pub fn well_known_symbols(&self) -> &WellKnownSymbols {
        &self.well_known_symbols
    }

    /// The realm of the running context, or the engine's own realm when
    /// nothing is running.
    pub fn current_realm(&self) -> CellId {
        match self.running_execution_context() {
            Some(ctx) => ctx.realm,
            None => self.realm.expect("engine used before its realm was created"),
        }
    }

    pub fn get_global_object(&self) -> CellId {
        self.heap.realm(self.current_realm()).global_object
    }

    pub fn intrinsic(&self, which: WellKnownIntrinsics) -> CellId {
        self.heap.realm(self.current_realm()).intrinsic(which)
    }

    pub fn execution_context_stack(&self) -> &ExecutionContextStack {
        &self.execution_context_stack
    }

    pub fn running_execution_context(&self) -> Option<&ExecutionContext> {
        self.execution_context_stack.get_running_execution_ctx()
    }

    pub fn running_execution_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.execution_context_stack.get_running_execution_ctx_mut()
    }

    pub fn push_execution_context(&mut self, ctx: ExecutionContext) {
        let cursor = self.executor.instruction_cursor();
        self.execution_context_stack.push_execution_ctx(ctx, cursor);
    }

    /// Pop the running context. Emptying the stack fires the
    /// [`set_on_call_stack_emptied`](Self::set_on_call_stack_emptied) callback.
    pub fn pop_execution_context(&mut self) -> Option<ExecutionContext> {
        let popped = self.execution_context_stack.pop_running_execution_ctx();
        if popped.is_some() && self.execution_context_stack.is_empty() {
            if let Some(callback) = self.on_call_stack_emptied.clone() {
                callback(self);
            }
        }
        popped
    }

    pub fn save_execution_context_stack(&mut self) {
        self.execution_context_stack.save();
    }

    pub fn restore_execution_context_stack(&mut self) {
        self.execution_context_stack.restore();
    }

    pub fn clear_execution_context_stack(&mut self) {
        self.execution_context_stack.clear();
    }

    pub fn get_active_script_or_module(&self) -> ScriptOrModule {
        self.execution_context_stack.get_active_script_or_module()
    }

    pub fn in_strict_mode(&self) -> bool {
        self.running_execution_context()
            .map(|ctx| ctx.is_strict)
            .unwrap_or(false)
    }

    pub fn set_on_call_stack_emptied(&mut self, callback: CallStackEmptiedCallback) {
        self.on_call_stack_emptied = Some(callback);
    }

    pub fn set_on_promise_unhandled_rejection(&mut self, callback: PromiseCallback) {
        self.on_promise_unhandled_rejection = Some(callback);
    }

    pub fn set_on_promise_rejection_handled(&mut self, callback: PromiseCallback) {
        self.on_promise_rejection_handled = Some(callback);
    }

    /// Receives every error a job completed with, after it is logged.
    pub fn set_on_job_error(&mut self, callback: JobErrorCallback) {
        self.on_job_error = Some(callback);
    }

    /// Call `f` with `this` and `args`. Native functions run in a context of
    /// their own; compiled ones get a fresh function environment.
    pub fn call(&mut self, f: JsValue, this: JsValue, args: &[JsValue]) -> ThrowCompletionOr<JsValue> {
        let function = match f {
            JsValue::Object(o) if self.heap.object(o).is_callable() => o,
            _ => {
                return Err(JErrorType::TypeError(
                    ErrorMessage::NotAFunction.format(&display_value(&self.heap, &f)),
                ))
            }
        };
        let data = match &self.heap.object(function).kind {
            ObjectKind::Function(data) => data,
            _ => unreachable!("callable object without function data"),
        };
        let behaviour = data.behaviour.clone();
        let name = data.name.clone();
        let environment = data.environment;
        let realm = data.realm.unwrap_or_else(|| self.current_realm());
        let script_or_module = data.script_or_module;
        let is_strict = data.is_strict;
        let is_arrow = data.is_arrow;
        let captures = data.captures.clone();

        let mut ctx = ExecutionContext::new(realm);
        ctx.function = Some(function);
        ctx.function_name = Some(name);
        ctx.script_or_module = script_or_module;
        ctx.is_strict = is_strict;
        ctx.arguments = args.to_vec();

        match behaviour {
            FunctionBehaviour::Native(native) => {
                ctx.this_value = Some(this);
                self.push_execution_context(ctx);
                let result = native(self, this, args, &captures);
                self.pop_execution_context();
                result
            }
            FunctionBehaviour::Compiled(executable) => {
                let env = new_function_environment(&mut self.heap, function, JsValue::Undefined, is_arrow, environment)?;
                if !is_arrow {
                    let this_value = if is_strict {
                        this
                    } else if this.is_nullish() {
                        JsValue::Object(self.heap.realm(realm).global_object)
                    } else {
                        JsValue::Object(self.to_object(&this)?)
                    };
                    if let EnvironmentRecordType::Function(record) = &mut self.heap.environment_mut(env).record {
                        record.bind_this_value(this_value)?;
                    }
                    ctx.this_value = Some(this_value);
                }
                ctx.lex_env = Some(env);
                ctx.var_env = Some(env);
                ctx.executable = Some(executable.clone());
                self.push_execution_context(ctx);
                let executor = self.executor.clone();
                let result = executor.run(self, &executable, Some(this)).value;
                self.pop_execution_context();
                result
            }
        }
    }

    pub fn new_native_function(&mut self, name: &str, behaviour: NativeFunction) -> ThrowCompletionOr<JsValue> {
        let realm = self.current_realm();
        self.new_native_function_in(realm, name, behaviour)
    }

    pub fn new_native_function_in(&mut self, realm: CellId, name: &str, behaviour: NativeFunction) -> ThrowCompletionOr<JsValue> {
        self.allocate_function(realm, FunctionData::native(name, behaviour, Some(realm)))
    }

    /// A native function that keeps `captures` alive and receives them on
    /// every call.
    pub fn new_native_function_with_captures(
        &mut self,
        name: &str,
        behaviour: NativeFunction,
        captures: &[JsValue],
    ) -> ThrowCompletionOr<JsValue> {
        let realm = self.current_realm();
        let mut data = FunctionData::native(name, behaviour, Some(realm));
        data.captures = captures.to_vec();
        self.allocate_function(realm, data)
    }

    /// A function object for code the executor compiled, closing over `environment`.
    pub fn create_compiled_function(
        &mut self,
        executable: Rc<Executable>,
        environment: Option<CellId>,
        is_strict: bool,
        is_arrow: bool,
    ) -> ThrowCompletionOr<CellId> {
        let realm = self.current_realm();
        let data = FunctionData {
            name: executable.name.clone(),
            kind: executable.kind,
            behaviour: FunctionBehaviour::Compiled(executable),
            environment,
            realm: Some(realm),
            script_or_module: self.get_active_script_or_module(),
            is_strict,
            is_arrow,
            captures: Vec::new(),
        };
        let function = self.allocate_function(realm, data)?;
        function.as_object().ok_or_else(|| {
            JErrorType::InternalError("function allocation did not produce an object".to_string())
        })
    }

    fn allocate_function(&mut self, realm: CellId, data: FunctionData) -> ThrowCompletionOr<JsValue> {
        let proto = self.heap.realm(realm).intrinsic(WellKnownIntrinsics::FunctionPrototype);
        let name = self.js_string(&data.name)?;
        let function = self
            .heap
            .allocate(HeapCell::Object(JsObject::new(Some(proto), ObjectKind::Function(data))))?;
        self.heap.object_mut(function).define_own_property(
            PropertyKey::from("name"),
            PropertyDescriptor::Data {
                value: name,
                writable: false,
                enumerable: false,
                configurable: true,
            },
        );
        Ok(JsValue::Object(function))
    }

    /// Compile `node` and run it in the running execution context.
    pub fn execute_ast_node(&mut self, node: &Node) -> ThrowCompletionOr<JsValue> {
        self.execute_ast_node_named(node, "")
    }

    fn execute_ast_node_named(&mut self, node: &Node, name: &str) -> ThrowCompletionOr<JsValue> {
        let executor = self.executor.clone();
        let executable = executor.compile(self, node, FunctionKind::Normal, name)?;
        executor.run(self, &executable, None).value
    }

    /// Evaluate `expression`; an anonymous function or class takes `name`.
    pub fn named_evaluation_if_anonymous_function(
        &mut self,
        expression: &Rc<Expression>,
        name: &str,
    ) -> ThrowCompletionOr<JsValue> {
        let node = Node::Expression(expression.clone());
        if expression.is_anonymous_function_definition() {
            self.execute_ast_node_named(&node, name)
        } else {
            self.execute_ast_node(&node)
        }
    }

    /// Parse and run a classic script in the global environment, then drain
    /// the promise jobs it queued.
    pub fn run_script(&mut self, source: &str, filename: &str) -> ThrowCompletionOr<JsValue> {
        debug!(vm = %self.id, filename, "running script");
        let parser = self.parser.clone();
        let program = parser.parse_script(source, filename).map_err(|errors| {
            JErrorType::SyntaxError(
                errors
                    .first()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "invalid script".to_string()),
            )
        })?;
        let program = Rc::new(program);
        let realm = self.current_realm();
        let script = ScriptId(self.scripts.len());
        self.scripts.push(ScriptRecord {
            filename: filename.to_string(),
            program: program.clone(),
            realm,
        });

        let global_env = self.heap.realm(realm).global_env;
        let mut ctx = ExecutionContext::new(realm);
        ctx.script_or_module = ScriptOrModule::Script(script);
        ctx.lex_env = Some(global_env);
        ctx.var_env = Some(global_env);
        ctx.is_strict = program.is_strict;
        self.push_execution_context(ctx);

        let executor = self.executor.clone();
        let result = executor
            .compile(self, &Node::Program(program), FunctionKind::Normal, "")
            .and_then(|executable| {
                if let Some(ctx) = self.running_execution_context_mut() {
                    ctx.executable = Some(executable.clone());
                }
                executor.run(self, &executable, None).value
            });
        self.pop_execution_context();
        self.run_queued_promise_jobs();
        result
    }

    /// Frames of the live stack, innermost first. The running frame's position
    /// comes from the executor, suspended frames use their recorded cursor.
    pub fn stack_trace(&self) -> Vec<StackFrame> {
        let contexts = self.execution_context_stack.contexts();
        let mut frames = Vec::with_capacity(contexts.len());
        for (depth, ctx) in contexts.iter().rev().enumerate() {
            let cursor = if depth == 0 {
                self.executor.instruction_cursor().or_else(|| ctx.cursor.clone())
            } else {
                ctx.cursor.clone()
            };
            frames.push(StackFrame {
                function_name: ctx.function_name.clone(),
                source_range: cursor.and_then(|c| c.source_range),
            });
        }
        frames
    }

    pub fn dump_backtrace(&self) {
        for (depth, frame) in self.stack_trace().iter().enumerate() {
            let location = frame
                .source_range
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            debug!(
                vm = %self.id,
                depth,
                function = frame.function_name.as_deref().unwrap_or("<anonymous>"),
                %location,
                "backtrace"
            );
        }
    }

    pub fn ensure_can_compile_strings(&mut self, source: &str) -> ThrowCompletionOr<()> {
        let hook = self.host_hooks.ensure_can_compile_strings.clone();
        hook(self, source)
    }

    pub fn ensure_can_add_private_element(&mut self, object: CellId) -> ThrowCompletionOr<()> {
        let hook = self.host_hooks.ensure_can_add_private_element.clone();
        hook(self, object)
    }

    pub fn new_array_buffer(&mut self, byte_length: usize) -> ThrowCompletionOr<CellId> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(byte_length).map_err(|_| {
            JErrorType::RangeError(ErrorMessage::NotEnoughMemoryToAllocate.format(&byte_length.to_string()))
        })?;
        bytes.resize(byte_length, 0);
        let proto = self.intrinsic(WellKnownIntrinsics::ArrayBufferPrototype);
        self.heap
            .allocate(HeapCell::Object(JsObject::new(Some(proto), ObjectKind::ArrayBuffer(bytes))))
    }

    /// Offer the resize to the host first; do it in place if the host declines.
    pub fn resize_array_buffer(&mut self, buffer: CellId, new_byte_length: usize) -> ThrowCompletionOr<()> {
        let hook = self.host_hooks.resize_array_buffer.clone();
        if hook(self, buffer, new_byte_length)? == HandledByHost::Unhandled {
            default_resize_array_buffer(self, buffer, new_byte_length)?;
        }
        Ok(())
    }

    pub fn module(&self, id: ModuleId) -> &ModuleRecord {
        &self.modules[id.0]
    }

    pub fn script(&self, id: ScriptId) -> &ScriptRecord {
        &self.scripts[id.0]
    }

    pub fn stored_modules(&self) -> &[StoredModule] {
        &self.stored_modules
    }
}
